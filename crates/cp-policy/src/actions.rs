// actions.rs — The <actions> and <transformations> containers.
//
// Both hold extension elements only, kept in insertion order. Which kinds
// they accept is entirely up to the extension registry.

use crate::container::{ChildList, UNORDERED};
use crate::document::NAMESPACE;
use crate::element::Element;
use crate::error::PolicyResult;
use crate::registry::{self, Capability, ExtensionElement};
use crate::xml::{QName, XmlNode, XmlWriter};

macro_rules! extension_container {
    ($(#[$doc:meta])* $name:ident, $tag:literal, $capability:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            items: ChildList<Box<dyn ExtensionElement>>,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    items: ChildList::new(&UNORDERED),
                }
            }
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Add an element; its kind must be registered for this container.
            pub fn add(&mut self, element: impl ExtensionElement) -> PolicyResult<()> {
                self.add_boxed(Box::new(element))
            }

            pub fn add_boxed(&mut self, element: Box<dyn ExtensionElement>) -> PolicyResult<()> {
                registry::ensure_accepted($capability, $tag, &element.kind())?;
                self.items.add(element);
                Ok(())
            }

            /// Remove the first element equal to `element`.
            pub fn remove(
                &mut self,
                element: &dyn ExtensionElement,
            ) -> Option<Box<dyn ExtensionElement>> {
                self.items.remove_where(|existing| existing.eq_dyn(element))
            }

            /// Remove the first element of the given kind.
            pub fn remove_kind(&mut self, kind: &QName) -> Option<Box<dyn ExtensionElement>> {
                self.items.remove_where(|element| &element.kind() == kind)
            }

            /// Replace the contents; every element is checked as in `add`.
            pub fn update(
                &mut self,
                elements: impl IntoIterator<Item = Box<dyn ExtensionElement>>,
            ) -> PolicyResult<()> {
                let mut replacement = Self::default();
                for element in elements {
                    replacement.add_boxed(element)?;
                }
                *self = replacement;
                Ok(())
            }

            pub fn clear(&mut self) {
                self.items.clear();
            }

            pub fn iter(&self) -> impl Iterator<Item = &dyn ExtensionElement> {
                self.items.iter().map(|element| &**element)
            }

            pub fn len(&self) -> usize {
                self.items.len()
            }

            pub fn is_empty(&self) -> bool {
                self.items.is_empty()
            }

            /// The first element of type `T`.
            pub fn get<T: ExtensionElement>(&self) -> Option<&T> {
                self.iter()
                    .find_map(|element| element.as_any().downcast_ref::<T>())
            }
        }

        impl Element for $name {
            const NAMESPACE: &'static str = NAMESPACE;
            const TAG: &'static str = $tag;

            fn from_node(node: &XmlNode) -> PolicyResult<Self> {
                let mut container = Self::default();
                for element in registry::parse_children($capability, &node.children)? {
                    container.items.add(element);
                }
                Ok(container)
            }

            fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
                self.check_validity()?;
                if self.items.is_empty() {
                    return writer.empty(&Self::qname(), &[]);
                }
                writer.start(&Self::qname(), &[])?;
                for element in &self.items {
                    element.write(writer)?;
                }
                writer.end()
            }

            fn check_validity(&self) -> PolicyResult<()> {
                self.items
                    .iter()
                    .try_for_each(|element| element.check_validity())
            }
        }
    };
}

extension_container!(
    /// What the policy server does when a rule applies.
    Actions,
    "actions",
    Capability::Action
);

extension_container!(
    /// How the data handed out under a rule is transformed.
    Transformations,
    "transformations",
    Capability::Transformation
);
