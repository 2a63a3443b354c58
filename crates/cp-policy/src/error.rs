// error.rs — Error types for the policy document model.
//
// Structural validation is never automatic on mutation: a document may hold
// an invalid state while it is being built, and `check_validity()` (which
// serialization always runs) reports it. Type errors surface immediately at
// assignment time.

use thiserror::Error;

/// Result alias used across the crate.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while building, parsing or serializing policy documents.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A required field or child is missing, or a container breaks its
    /// cardinality rules (e.g. a `validity` element without intervals).
    #[error("invalid <{element}> element: {reason}")]
    Validation { element: String, reason: String },

    /// A rule id is already used by another rule of the same rule set.
    #[error("duplicate rule id '{id}'")]
    DuplicateRuleId { id: String },

    /// No rule with this id exists in the rule set.
    #[error("no rule with id '{id}'")]
    RuleNotFound { id: String },

    /// A value cannot be coerced to the declared type of a field.
    #[error("field '{field}' expects a {expected}: {reason}")]
    Type {
        field: String,
        expected: &'static str,
        reason: String,
    },

    /// A container does not accept children of this kind.
    #[error("<{container}> does not accept {kind} elements")]
    UnacceptedKind { container: String, kind: String },

    /// A namespace registration clashes with an existing one.
    #[error("namespace '{namespace}' cannot be registered: {reason}")]
    NamespaceConflict { namespace: String, reason: String },

    /// The wire input is not well-formed XML, or the writer failed.
    #[error("xml error: {reason}")]
    Xml { reason: String },

    /// An element has a different qualified name than the one expected here.
    #[error("expected {expected} element, found {found}")]
    UnexpectedElement { expected: String, found: String },
}

impl PolicyError {
    pub(crate) fn validation(element: &str, reason: impl Into<String>) -> Self {
        PolicyError::Validation {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        PolicyError::Xml {
            reason: err.to_string(),
        }
    }
}
