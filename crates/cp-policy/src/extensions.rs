// extensions.rs — Built-in extension elements.
//
// `FalseCondition` and `RuleDisplayName` live in the agp-cp namespace and
// are registered by `document::init`. `OpaqueElement` carries any other
// registered kind through parse and serialize untouched, which is how
// vendor actions and transformations survive a round trip.

use std::any::Any;

use crate::document::AGP_NAMESPACE;
use crate::element::Element;
use crate::error::PolicyResult;
use crate::field::{self, FieldDef, FieldLocation, FieldType, Fields};
use crate::registry::{self, Capability, ExtensionElement, ExtensionKind, TypedExtension};
use crate::xml::{QName, XmlNode, XmlWriter, XML_NAMESPACE};

/// A condition that is never satisfied; used to disable a rule in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FalseCondition;

impl Element for FalseCondition {
    const NAMESPACE: &'static str = AGP_NAMESPACE;
    const TAG: &'static str = "false-condition";

    fn from_node(_node: &XmlNode) -> PolicyResult<Self> {
        Ok(FalseCondition)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        writer.empty(&Self::qname(), &[])
    }
}

impl TypedExtension for FalseCondition {}

/// Human-readable rule name, optionally tagged with a language.
#[derive(Debug, Clone, Default)]
pub struct RuleDisplayName {
    value: Option<String>,
    lang: Option<String>,
}

field::text_slot!(get_value, set_value, RuleDisplayName, value);
field::text_slot!(get_lang, set_lang, RuleDisplayName, lang);

impl Fields for RuleDisplayName {
    const ELEMENT: &'static str = "display-name";
    const FIELDS: &'static [FieldDef<Self>] = &[
        FieldDef {
            name: "value",
            namespace: "",
            wire_name: "",
            location: FieldLocation::Text,
            value_type: FieldType::Text,
            required: true,
            test_equal: true,
            get: get_value,
            set: set_value,
            onset: None,
        },
        FieldDef {
            name: "lang",
            namespace: XML_NAMESPACE,
            wire_name: "lang",
            location: FieldLocation::Attribute,
            value_type: FieldType::Text,
            required: false,
            test_equal: true,
            get: get_lang,
            set: set_lang,
            onset: None,
        },
    ];
}

impl RuleDisplayName {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn set_lang(&mut self, lang: Option<String>) {
        self.lang = lang;
    }
}

impl PartialEq for RuleDisplayName {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other)
    }
}

impl Element for RuleDisplayName {
    const NAMESPACE: &'static str = AGP_NAMESPACE;
    const TAG: &'static str = "display-name";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut display_name = Self::default();
        field::parse_fields(&mut display_name, node)?;
        Ok(display_name)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        field::write_fields(self, writer, &Self::qname())
    }

    fn check_validity(&self) -> PolicyResult<()> {
        field::check_required(self)
    }
}

impl TypedExtension for RuleDisplayName {}

/// An extension element kept as a raw element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueElement {
    node: XmlNode,
}

impl OpaqueElement {
    pub fn new(node: XmlNode) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &XmlNode {
        &self.node
    }

    /// Parse function used when registering opaque kinds.
    pub fn parse_boxed(node: &XmlNode) -> PolicyResult<Box<dyn ExtensionElement>> {
        Ok(Box::new(Self::new(node.clone())))
    }
}

impl ExtensionElement for OpaqueElement {
    fn kind(&self) -> QName {
        self.node.name.clone()
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        writer.write_node(&self.node)
    }

    fn clone_box(&self) -> Box<dyn ExtensionElement> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn ExtensionElement) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Accept `name` under `capability` and keep its elements as raw trees.
pub fn register_opaque(capability: Capability, name: QName) {
    registry::register(
        capability,
        ExtensionKind {
            name,
            parse: OpaqueElement::parse_boxed,
        },
    );
}
