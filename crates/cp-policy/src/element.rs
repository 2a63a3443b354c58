// element.rs — The contract every built-in element type implements.

use crate::error::{PolicyError, PolicyResult};
use crate::xml::{QName, XmlNode, XmlWriter};

/// A typed element of the common-policy schema.
pub trait Element: Sized {
    const NAMESPACE: &'static str;
    const TAG: &'static str;

    fn qname() -> QName {
        QName::new(Self::NAMESPACE, Self::TAG)
    }

    /// Build the element from a parsed node (whose name has been checked).
    fn from_node(node: &XmlNode) -> PolicyResult<Self>;

    /// Write the element, children included.
    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()>;

    /// Structural checks that are deferred until serialization.
    fn check_validity(&self) -> PolicyResult<()> {
        Ok(())
    }

    /// Check the node's name, then build the element.
    fn parse(node: &XmlNode) -> PolicyResult<Self> {
        if !node.name.is(Self::NAMESPACE, Self::TAG) {
            return Err(PolicyError::UnexpectedElement {
                expected: Self::qname().to_string(),
                found: node.name.to_string(),
            });
        }
        Self::from_node(node)
    }
}
