// registry.rs — Process-wide extension registry.
//
// Conditions, actions, transformations and rule extensions are open sets:
// vendors define new element kinds without touching the containers that
// hold them. A kind is registered under a capability tag together with the
// function that parses it; containers declared against that capability
// accept the kind from then on, both when built in code and when parsed.
//
// Registration is expected during startup, before documents that use the
// kind are parsed. There is no unregister.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::container::Kind;
use crate::element::Element;
use crate::error::{PolicyError, PolicyResult};
use crate::xml::{QName, XmlNode, XmlWriter};

/// The capability tags containers are declared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Condition,
    Action,
    Transformation,
    RuleExtension,
}

impl Capability {
    pub fn tag(self) -> &'static str {
        match self {
            Capability::Condition => "condition",
            Capability::Action => "action",
            Capability::Transformation => "transformation",
            Capability::RuleExtension => "rule-extension",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An element of a registered (non built-in) kind.
pub trait ExtensionElement: fmt::Debug + Any {
    /// Qualified name written on the wire.
    fn kind(&self) -> QName;

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()>;

    fn check_validity(&self) -> PolicyResult<()> {
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtensionElement>;

    /// Structural equality with another extension element.
    fn eq_dyn(&self, other: &dyn ExtensionElement) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Extension kinds with a fixed qualified name and a typed representation.
///
/// Implementing this marker is enough to make an `Element` usable as an
/// extension element.
pub trait TypedExtension: Element + Clone + PartialEq + fmt::Debug + 'static {}

impl<T: TypedExtension> ExtensionElement for T {
    fn kind(&self) -> QName {
        T::qname()
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        Element::write(self, writer)
    }

    fn check_validity(&self) -> PolicyResult<()> {
        Element::check_validity(self)
    }

    fn clone_box(&self) -> Box<dyn ExtensionElement> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn ExtensionElement) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn ExtensionElement> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl PartialEq for dyn ExtensionElement {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other)
    }
}

impl Kind for Box<dyn ExtensionElement> {
    fn kind(&self) -> QName {
        (**self).kind()
    }
}

/// Parses one element of a registered kind.
pub type ParseFn = fn(&XmlNode) -> PolicyResult<Box<dyn ExtensionElement>>;

/// Parse function for a typed extension kind.
pub fn parse_as<T: TypedExtension>(node: &XmlNode) -> PolicyResult<Box<dyn ExtensionElement>> {
    Ok(Box::new(T::parse(node)?))
}

/// A registered element kind.
#[derive(Debug, Clone)]
pub struct ExtensionKind {
    pub name: QName,
    pub parse: ParseFn,
}

impl ExtensionKind {
    /// The kind of a typed extension.
    pub fn of<T: TypedExtension>() -> Self {
        Self {
            name: T::qname(),
            parse: parse_as::<T>,
        }
    }
}

type Table = HashMap<Capability, Vec<ExtensionKind>>;

static EXTENSIONS: OnceLock<RwLock<Table>> = OnceLock::new();

fn table() -> &'static RwLock<Table> {
    EXTENSIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Accept `kind` in every container declared against `capability`.
///
/// Registering a name that is already known for the capability replaces its
/// parse function.
pub fn register(capability: Capability, kind: ExtensionKind) {
    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    let kinds = table.entry(capability).or_default();
    match kinds.iter_mut().find(|known| known.name == kind.name) {
        Some(known) => known.parse = kind.parse,
        None => {
            tracing::debug!(capability = capability.tag(), kind = %kind.name, "registered extension kind");
            kinds.push(kind);
        }
    }
}

/// Whether containers declared against `capability` accept `name`.
pub fn accepts(capability: Capability, name: &QName) -> bool {
    lookup(capability, name).is_some()
}

/// The parse function registered for `name` under `capability`.
pub fn lookup(capability: Capability, name: &QName) -> Option<ParseFn> {
    crate::document::init();
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&capability)
        .and_then(|kinds| kinds.iter().find(|known| &known.name == name))
        .map(|known| known.parse)
}

/// Names registered under `capability`, in registration order.
pub fn registered(capability: Capability) -> Vec<QName> {
    crate::document::init();
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&capability)
        .map(|kinds| kinds.iter().map(|known| known.name.clone()).collect())
        .unwrap_or_default()
}

/// Fail with `UnacceptedKind` unless `name` is registered under `capability`.
pub fn ensure_accepted(capability: Capability, container: &str, name: &QName) -> PolicyResult<()> {
    if accepts(capability, name) {
        Ok(())
    } else {
        Err(PolicyError::UnacceptedKind {
            container: container.to_string(),
            kind: name.to_string(),
        })
    }
}

/// Parse the children of `node` that are registered under `capability`.
///
/// Children of unregistered kinds are skipped; a registered child that fails
/// to parse is an error.
pub fn parse_children<'a>(
    capability: Capability,
    nodes: impl IntoIterator<Item = &'a XmlNode>,
) -> PolicyResult<Vec<Box<dyn ExtensionElement>>> {
    let mut parsed = Vec::new();
    for node in nodes {
        match lookup(capability, &node.name) {
            Some(parse) => parsed.push(parse(node)?),
            None => tracing::debug!(
                capability = capability.tag(),
                kind = %node.name,
                "skipping unregistered element"
            ),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::OpaqueElement;

    fn kind(local: &str) -> ExtensionKind {
        ExtensionKind {
            name: QName::new("urn:test:registry", local),
            parse: OpaqueElement::parse_boxed,
        }
    }

    #[test]
    fn builtin_kinds_are_registered_by_init() {
        let conditions = registered(Capability::Condition);
        assert!(conditions
            .iter()
            .any(|name| name.local_name() == "false-condition"));
        let rule_extensions = registered(Capability::RuleExtension);
        assert!(rule_extensions
            .iter()
            .any(|name| name.local_name() == "display-name"));
    }

    #[test]
    fn registration_is_per_capability() {
        register(Capability::Action, kind("only-action"));
        let name = QName::new("urn:test:registry", "only-action");
        assert!(accepts(Capability::Action, &name));
        assert!(!accepts(Capability::Transformation, &name));
    }

    #[test]
    fn re_registration_does_not_duplicate() {
        register(Capability::Transformation, kind("twice"));
        register(Capability::Transformation, kind("twice"));
        let count = registered(Capability::Transformation)
            .iter()
            .filter(|name| name.local_name() == "twice")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn ensure_accepted_reports_container_and_kind() {
        let name = QName::new("urn:test:registry", "never-registered");
        match ensure_accepted(Capability::Condition, "conditions", &name) {
            Err(PolicyError::UnacceptedKind { container, kind }) => {
                assert_eq!(container, "conditions");
                assert_eq!(kind, "{urn:test:registry}never-registered");
            }
            other => panic!("expected UnacceptedKind, got {:?}", other),
        }
    }

    #[test]
    fn parse_children_skips_unregistered_kinds() {
        register(Capability::Action, kind("known"));
        let nodes = vec![
            XmlNode::new(QName::new("urn:test:registry", "known")),
            XmlNode::new(QName::new("urn:test:registry", "unknown")),
        ];
        let parsed = parse_children(Capability::Action, &nodes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind().local_name(), "known");
    }

    #[test]
    fn capability_tags() {
        assert_eq!(Capability::RuleExtension.tag(), "rule-extension");
        assert_eq!(
            serde_json::to_string(&Capability::RuleExtension).unwrap(),
            "\"rule-extension\""
        );
    }
}
