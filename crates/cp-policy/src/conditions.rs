// conditions.rs — The <conditions> container and the <sphere> condition.
//
// A conditions block holds at most one identity, one sphere and one
// validity condition, always written in that order, followed by extension
// conditions in the order they were added. Extension conditions are
// accepted when their kind is registered under `Capability::Condition`.
// The one-of-each rule is checked by `check_validity`, not on insertion.

use crate::container::{ChildList, ChildOrder, Kind};
use crate::document::NAMESPACE;
use crate::element::Element;
use crate::error::{PolicyError, PolicyResult};
use crate::field::{self, FieldDef, FieldLocation, FieldType, Fields};
use crate::identity::Identity;
use crate::registry::{self, Capability, ExtensionElement};
use crate::validity::Validity;
use crate::xml::{QName, XmlNode, XmlWriter};

/// The <sphere value=…/> condition.
#[derive(Debug, Clone, Default)]
pub struct Sphere {
    value: Option<String>,
}

field::text_slot!(get_sphere_value, set_sphere_value, Sphere, value);

impl Fields for Sphere {
    const ELEMENT: &'static str = "sphere";
    const FIELDS: &'static [FieldDef<Self>] = &[FieldDef {
        name: "value",
        namespace: "",
        wire_name: "value",
        location: FieldLocation::Attribute,
        value_type: FieldType::Text,
        required: true,
        test_equal: true,
        get: get_sphere_value,
        set: set_sphere_value,
        onset: None,
    }];
}

impl Sphere {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }
}

impl PartialEq for Sphere {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other)
    }
}

impl Element for Sphere {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "sphere";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut sphere = Self::default();
        field::parse_fields(&mut sphere, node)?;
        Ok(sphere)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        field::write_fields(self, writer, &Self::qname())
    }

    fn check_validity(&self) -> PolicyResult<()> {
        field::check_required(self)
    }
}

/// One member of a conditions block.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionItem {
    Identity(Identity),
    Sphere(Sphere),
    Validity(Validity),
    Extension(Box<dyn ExtensionElement>),
}

impl ConditionItem {
    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        match self {
            ConditionItem::Identity(identity) => identity.write(writer),
            ConditionItem::Sphere(sphere) => sphere.write(writer),
            ConditionItem::Validity(validity) => validity.write(writer),
            ConditionItem::Extension(extension) => extension.write(writer),
        }
    }

    fn check_validity(&self) -> PolicyResult<()> {
        match self {
            ConditionItem::Identity(identity) => identity.check_validity(),
            ConditionItem::Sphere(sphere) => sphere.check_validity(),
            ConditionItem::Validity(validity) => validity.check_validity(),
            ConditionItem::Extension(extension) => extension.check_validity(),
        }
    }
}

impl Kind for ConditionItem {
    fn kind(&self) -> QName {
        match self {
            ConditionItem::Identity(_) => Identity::qname(),
            ConditionItem::Sphere(_) => Sphere::qname(),
            ConditionItem::Validity(_) => Validity::qname(),
            ConditionItem::Extension(extension) => extension.kind(),
        }
    }
}

impl From<Identity> for ConditionItem {
    fn from(identity: Identity) -> Self {
        ConditionItem::Identity(identity)
    }
}

impl From<Sphere> for ConditionItem {
    fn from(sphere: Sphere) -> Self {
        ConditionItem::Sphere(sphere)
    }
}

impl From<Validity> for ConditionItem {
    fn from(validity: Validity) -> Self {
        ConditionItem::Validity(validity)
    }
}

impl From<Box<dyn ExtensionElement>> for ConditionItem {
    fn from(extension: Box<dyn ExtensionElement>) -> Self {
        ConditionItem::Extension(extension)
    }
}

static CONDITION_ORDER: ChildOrder = ChildOrder::new(&[
    (NAMESPACE, "identity"),
    (NAMESPACE, "sphere"),
    (NAMESPACE, "validity"),
]);

/// The <conditions> block of a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    items: ChildList<ConditionItem>,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            items: ChildList::new(&CONDITION_ORDER),
        }
    }
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition at its wire position.
    ///
    /// Extension conditions must be registered under `Capability::Condition`.
    pub fn add(&mut self, item: impl Into<ConditionItem>) -> PolicyResult<()> {
        let item = item.into();
        if let ConditionItem::Extension(extension) = &item {
            registry::ensure_accepted(Capability::Condition, Self::TAG, &extension.kind())?;
        }
        self.items.add(item);
        Ok(())
    }

    /// Add an extension condition.
    pub fn add_extension(&mut self, extension: impl ExtensionElement) -> PolicyResult<()> {
        self.add(Box::new(extension) as Box<dyn ExtensionElement>)
    }

    /// Remove the first member equal to `item`.
    pub fn remove(&mut self, item: &ConditionItem) -> Option<ConditionItem> {
        self.items.remove(item)
    }

    /// Remove every member of the given kind.
    pub fn remove_kind(&mut self, kind: &QName) -> usize {
        let mut removed = 0;
        while self.items.remove_where(|item| &item.kind() == kind).is_some() {
            removed += 1;
        }
        removed
    }

    /// Replace the contents; every member is checked as in `add`.
    pub fn update(&mut self, items: impl IntoIterator<Item = ConditionItem>) -> PolicyResult<()> {
        let mut replacement = Conditions::default();
        for item in items {
            replacement.add(item)?;
        }
        *self = replacement;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConditionItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.items.iter().find_map(|item| match item {
            ConditionItem::Identity(identity) => Some(identity),
            _ => None,
        })
    }

    pub fn identity_mut(&mut self) -> Option<&mut Identity> {
        self.items.iter_mut().find_map(|item| match item {
            ConditionItem::Identity(identity) => Some(identity),
            _ => None,
        })
    }

    pub fn sphere(&self) -> Option<&Sphere> {
        self.items.iter().find_map(|item| match item {
            ConditionItem::Sphere(sphere) => Some(sphere),
            _ => None,
        })
    }

    pub fn validity(&self) -> Option<&Validity> {
        self.items.iter().find_map(|item| match item {
            ConditionItem::Validity(validity) => Some(validity),
            _ => None,
        })
    }

    pub fn validity_mut(&mut self) -> Option<&mut Validity> {
        self.items.iter_mut().find_map(|item| match item {
            ConditionItem::Validity(validity) => Some(validity),
            _ => None,
        })
    }

    /// Replace the identity condition (or drop it with `None`).
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.remove_kind(&Identity::qname());
        if let Some(identity) = identity {
            self.items.add(identity.into());
        }
    }

    /// Replace the sphere condition (or drop it with `None`).
    pub fn set_sphere(&mut self, sphere: Option<Sphere>) {
        self.remove_kind(&Sphere::qname());
        if let Some(sphere) = sphere {
            self.items.add(sphere.into());
        }
    }

    /// Replace the validity condition (or drop it with `None`).
    pub fn set_validity(&mut self, validity: Option<Validity>) {
        self.remove_kind(&Validity::qname());
        if let Some(validity) = validity {
            self.items.add(validity.into());
        }
    }

    /// Extension conditions, in wire order.
    pub fn extensions(&self) -> impl Iterator<Item = &dyn ExtensionElement> {
        self.items.iter().filter_map(|item| match item {
            ConditionItem::Extension(extension) => Some(&**extension),
            _ => None,
        })
    }

    /// The first extension condition of type `T`.
    pub fn extension<T: ExtensionElement>(&self) -> Option<&T> {
        self.extensions()
            .find_map(|extension| extension.as_any().downcast_ref::<T>())
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a ConditionItem;
    type IntoIter = std::slice::Iter<'a, ConditionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Element for Conditions {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "conditions";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut conditions = Self::default();
        for child in &node.children {
            let item: ConditionItem = if child.name == Identity::qname() {
                Identity::from_node(child)?.into()
            } else if child.name == Sphere::qname() {
                Sphere::from_node(child)?.into()
            } else if child.name == Validity::qname() {
                Validity::from_node(child)?.into()
            } else if let Some(parse) = registry::lookup(Capability::Condition, &child.name) {
                ConditionItem::Extension(parse(child)?)
            } else {
                tracing::debug!(element = %child.name, "skipping unregistered condition");
                continue;
            };
            conditions.items.add(item);
        }
        Ok(conditions)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        self.check_validity()?;
        if self.items.is_empty() {
            return writer.empty(&Self::qname(), &[]);
        }
        writer.start(&Self::qname(), &[])?;
        for item in &self.items {
            item.write(writer)?;
        }
        writer.end()
    }

    fn check_validity(&self) -> PolicyResult<()> {
        for fixed in [Identity::qname(), Sphere::qname(), Validity::qname()] {
            let count = self.items.iter().filter(|item| item.kind() == fixed).count();
            if count > 1 {
                return Err(PolicyError::validation(
                    Self::TAG,
                    format!("at most one <{}> is allowed, found {}", fixed.local_name(), count),
                ));
            }
        }
        for item in &self.items {
            item.check_validity()?;
        }
        Ok(())
    }
}
