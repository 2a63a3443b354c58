// identity.rs — The <identity> condition and identity matching.
//
// An identity condition lists alternatives: <one id=…/> names a single
// requester, <many domain=…> admits a whole domain (or everyone, without a
// domain) minus the <except/> entries inside it. A requester identifier
// matches the condition when any alternative matches.
//
// The domain part of an identifier is everything after its first '@'.

use crate::container::{ChildList, Kind, UNORDERED};
use crate::document::NAMESPACE;
use crate::element::Element;
use crate::error::PolicyResult;
use crate::field::{self, FieldDef, FieldLocation, FieldType, FieldValue, Fields};
use crate::xml::{QName, XmlNode, XmlWriter};

fn domain_part(uri: &str) -> Option<&str> {
    uri.split_once('@').map(|(_, domain)| domain)
}

// ── <one> ───────────────────────────────────────────────────────

/// A single requester, matched by exact string comparison.
#[derive(Debug, Clone, Default)]
pub struct IdentityOne {
    id: Option<String>,
}

field::text_slot!(get_one_id, set_one_id, IdentityOne, id);

impl Fields for IdentityOne {
    const ELEMENT: &'static str = "one";
    const FIELDS: &'static [FieldDef<Self>] = &[FieldDef {
        name: "id",
        namespace: "",
        wire_name: "id",
        location: FieldLocation::Attribute,
        value_type: FieldType::Text,
        required: true,
        test_equal: true,
        get: get_one_id,
        set: set_one_id,
        onset: None,
    }];
}

impl IdentityOne {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.id.as_deref() == Some(uri)
    }
}

impl PartialEq for IdentityOne {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other)
    }
}

impl Element for IdentityOne {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "one";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut one = Self::default();
        field::parse_fields(&mut one, node)?;
        Ok(one)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        field::write_fields(self, writer, &Self::qname())
    }

    fn check_validity(&self) -> PolicyResult<()> {
        field::check_required(self)
    }
}

// ── <except> ────────────────────────────────────────────────────

/// An exclusion inside <many>: either one identifier or one domain.
///
/// Setting either field clears the other.
#[derive(Debug, Clone, Default)]
pub struct IdentityExcept {
    id: Option<String>,
    domain: Option<String>,
}

field::text_slot!(get_except_id, set_except_id, IdentityExcept, id);
field::text_slot!(get_except_domain, set_except_domain, IdentityExcept, domain);

fn clear_domain(except: &mut IdentityExcept, value: Option<&FieldValue>) {
    if value.is_some() {
        except.domain = None;
    }
}

fn clear_id(except: &mut IdentityExcept, value: Option<&FieldValue>) {
    if value.is_some() {
        except.id = None;
    }
}

const EXCEPT_ID: FieldDef<IdentityExcept> = FieldDef {
    name: "id",
    namespace: "",
    wire_name: "id",
    location: FieldLocation::Attribute,
    value_type: FieldType::Text,
    required: false,
    test_equal: true,
    get: get_except_id,
    set: set_except_id,
    onset: Some(clear_domain),
};

const EXCEPT_DOMAIN: FieldDef<IdentityExcept> = FieldDef {
    name: "domain",
    namespace: "",
    wire_name: "domain",
    location: FieldLocation::Attribute,
    value_type: FieldType::Text,
    required: false,
    test_equal: true,
    get: get_except_domain,
    set: set_except_domain,
    onset: Some(clear_id),
};

impl Fields for IdentityExcept {
    const ELEMENT: &'static str = "except";
    const FIELDS: &'static [FieldDef<Self>] = &[EXCEPT_ID, EXCEPT_DOMAIN];
}

impl IdentityExcept {
    /// Build from optional parts; when both are given the domain wins, as it
    /// is assigned last.
    pub fn new(id: Option<String>, domain: Option<String>) -> Self {
        let mut except = Self::default();
        except.set_id(id);
        except.set_domain(domain);
        except
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new(Some(id.into()), None)
    }

    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self::new(None, Some(domain.into()))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        field::store(self, &EXCEPT_ID, id.map(FieldValue::Text));
    }

    pub fn set_domain(&mut self, domain: Option<String>) {
        field::store(self, &EXCEPT_DOMAIN, domain.map(FieldValue::Text));
    }

    /// True when `uri` is NOT excluded by this entry.
    pub fn matches(&self, uri: &str) -> bool {
        match (&self.id, &self.domain) {
            (Some(id), _) => id != uri,
            (None, Some(domain)) => domain_part(uri) != Some(domain.as_str()),
            (None, None) => true,
        }
    }
}

impl PartialEq for IdentityExcept {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other)
    }
}

impl Kind for IdentityExcept {
    fn kind(&self) -> QName {
        Self::qname()
    }
}

impl Element for IdentityExcept {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "except";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut except = Self::default();
        field::parse_fields(&mut except, node)?;
        Ok(except)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        field::write_fields(self, writer, &Self::qname())
    }
}

// ── <many> ──────────────────────────────────────────────────────

/// Every requester (of a domain, when one is set) except the listed ones.
#[derive(Debug, Clone)]
pub struct IdentityMany {
    domain: Option<String>,
    exceptions: ChildList<IdentityExcept>,
}

field::text_slot!(get_many_domain, set_many_domain, IdentityMany, domain);

impl Fields for IdentityMany {
    const ELEMENT: &'static str = "many";
    const FIELDS: &'static [FieldDef<Self>] = &[FieldDef {
        name: "domain",
        namespace: "",
        wire_name: "domain",
        location: FieldLocation::Attribute,
        value_type: FieldType::Text,
        required: false,
        test_equal: true,
        get: get_many_domain,
        set: set_many_domain,
        onset: None,
    }];
}

impl Default for IdentityMany {
    fn default() -> Self {
        Self {
            domain: None,
            exceptions: ChildList::new(&UNORDERED),
        }
    }
}

impl IdentityMany {
    /// Everyone, with no exceptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everyone in `domain`.
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    pub fn with_exception(mut self, except: IdentityExcept) -> Self {
        self.exceptions.add(except);
        self
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn set_domain(&mut self, domain: Option<String>) {
        self.domain = domain;
    }

    pub fn exceptions(&self) -> &ChildList<IdentityExcept> {
        &self.exceptions
    }

    pub fn add_exception(&mut self, except: IdentityExcept) {
        self.exceptions.add(except);
    }

    pub fn remove_exception(&mut self, except: &IdentityExcept) -> Option<IdentityExcept> {
        self.exceptions.remove(except)
    }

    pub fn update_exceptions(&mut self, exceptions: impl IntoIterator<Item = IdentityExcept>) {
        self.exceptions.update(exceptions);
    }

    pub fn matches(&self, uri: &str) -> bool {
        if let Some(domain) = &self.domain {
            if domain_part(uri).unwrap_or("") != domain {
                return false;
            }
        }
        self.exceptions.iter().all(|except| except.matches(uri))
    }
}

impl PartialEq for IdentityMany {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other) && self.exceptions == other.exceptions
    }
}

impl Element for IdentityMany {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "many";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut many = Self::default();
        field::parse_fields(&mut many, node)?;
        for child in &node.children {
            if child.name == IdentityExcept::qname() {
                many.exceptions.add(IdentityExcept::from_node(child)?);
            } else {
                tracing::debug!(element = %child.name, "ignoring unknown child of <many>");
            }
        }
        Ok(many)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        let attributes = field::attributes(self);
        if self.exceptions.is_empty() {
            return writer.empty(&Self::qname(), &attributes);
        }
        writer.start(&Self::qname(), &attributes)?;
        for except in &self.exceptions {
            except.write(writer)?;
        }
        writer.end()
    }
}

// ── <identity> ──────────────────────────────────────────────────

/// One alternative of an identity condition.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityAlternative {
    One(IdentityOne),
    Many(IdentityMany),
}

impl IdentityAlternative {
    pub fn matches(&self, uri: &str) -> bool {
        match self {
            IdentityAlternative::One(one) => one.matches(uri),
            IdentityAlternative::Many(many) => many.matches(uri),
        }
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        match self {
            IdentityAlternative::One(one) => one.write(writer),
            IdentityAlternative::Many(many) => many.write(writer),
        }
    }
}

impl Kind for IdentityAlternative {
    fn kind(&self) -> QName {
        match self {
            IdentityAlternative::One(_) => IdentityOne::qname(),
            IdentityAlternative::Many(_) => IdentityMany::qname(),
        }
    }
}

impl From<IdentityOne> for IdentityAlternative {
    fn from(one: IdentityOne) -> Self {
        IdentityAlternative::One(one)
    }
}

impl From<IdentityMany> for IdentityAlternative {
    fn from(many: IdentityMany) -> Self {
        IdentityAlternative::Many(many)
    }
}

/// The <identity> condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    alternatives: ChildList<IdentityAlternative>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            alternatives: ChildList::new(&UNORDERED),
        }
    }
}

impl Identity {
    pub fn new(alternatives: impl IntoIterator<Item = IdentityAlternative>) -> Self {
        let mut identity = Self::default();
        identity.alternatives.extend(alternatives);
        identity
    }

    pub fn add(&mut self, alternative: impl Into<IdentityAlternative>) {
        self.alternatives.add(alternative.into());
    }

    pub fn remove(&mut self, alternative: &IdentityAlternative) -> Option<IdentityAlternative> {
        self.alternatives.remove(alternative)
    }

    pub fn update(&mut self, alternatives: impl IntoIterator<Item = IdentityAlternative>) {
        self.alternatives.update(alternatives);
    }

    pub fn alternatives(&self) -> &ChildList<IdentityAlternative> {
        &self.alternatives
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Whether `uri` satisfies any alternative.
    pub fn matches(&self, uri: &str) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(uri))
    }
}

impl Element for Identity {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "identity";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut identity = Self::default();
        for child in &node.children {
            if child.name == IdentityOne::qname() {
                identity.add(IdentityOne::from_node(child)?);
            } else if child.name == IdentityMany::qname() {
                identity.add(IdentityMany::from_node(child)?);
            } else {
                tracing::debug!(element = %child.name, "ignoring unknown child of <identity>");
            }
        }
        Ok(identity)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        self.check_validity()?;
        if self.alternatives.is_empty() {
            return writer.empty(&Self::qname(), &[]);
        }
        writer.start(&Self::qname(), &[])?;
        for alternative in &self.alternatives {
            alternative.write(writer)?;
        }
        writer.end()
    }

    fn check_validity(&self) -> PolicyResult<()> {
        for alternative in &self.alternatives {
            if let IdentityAlternative::One(one) = alternative {
                one.check_validity()?;
            }
        }
        Ok(())
    }
}
