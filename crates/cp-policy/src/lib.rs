//! # cp-policy
//!
//! Document model for RFC 4745 common-policy authorization documents.
//!
//! A [`RuleSet`] holds [`Rule`]s; each rule gates its actions and
//! transformations on [`Conditions`] such as requester [`Identity`], a
//! [`Sphere`] and [`Validity`] windows. Documents parse from and serialize to
//! `application/auth-policy+xml`, and the [`PolicyEngine`] tells which rules
//! apply to a request.
//!
//! ## Key invariants
//!
//! - **Wire order**: within `<conditions>` the order is identity, sphere,
//!   validity; within `<rule>` it is conditions, actions, transformations.
//!   Insertion order never changes the output.
//! - **Unique ids**: a rule set never holds two rules with the same id.
//! - **Explicit validation**: mutation never validates; `check_validity()`
//!   does, and serialization always runs it.
//! - **Open extension points**: conditions, actions, transformations and
//!   rule extensions accept any kind registered in the [`registry`].
//!
//! ```no_run
//! use cp_policy::{PolicyEngine, PolicyRequest, RuleSet};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ruleset = RuleSet::from_xml(&std::fs::read_to_string("pres-rules.xml")?)?;
//! let engine = PolicyEngine::new(ruleset);
//! for id in engine.evaluate(&PolicyRequest::new("sip:alice@example.com")) {
//!     println!("{id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod conditions;
pub mod container;
pub mod document;
pub mod element;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod field;
pub mod identity;
pub mod namespace;
pub mod registry;
pub mod rule;
pub mod ruleset;
pub mod validity;
pub mod xml;

pub use actions::{Actions, Transformations};
pub use conditions::{ConditionItem, Conditions, Sphere};
pub use document::{init, AGP_NAMESPACE, COMMON_POLICY, CONTENT_TYPE, NAMESPACE};
pub use element::Element;
pub use engine::{EvaluationStep, EvaluationTrace, PolicyEngine, PolicyRequest};
pub use error::{PolicyError, PolicyResult};
pub use extensions::{register_opaque, FalseCondition, OpaqueElement, RuleDisplayName};
pub use identity::{Identity, IdentityAlternative, IdentityExcept, IdentityMany, IdentityOne};
pub use namespace::{register_namespace, DocumentType};
pub use registry::{Capability, ExtensionElement, ExtensionKind, TypedExtension};
pub use rule::Rule;
pub use ruleset::RuleSet;
pub use validity::{Timestamp, Validity, ValidityInterval};
pub use xml::{QName, SerializeOptions, XmlNode};
