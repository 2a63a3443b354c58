// namespace.rs — Process-wide namespace/schema registry.
//
// Maps (document type, namespace URI) to the short prefix used when writing
// and an optional schema reference. The table is filled during startup (see
// `document::init`) and is read-mostly afterwards; the lock only exists
// because Rust statics must be `Sync`.
//
// Re-registering an identical entry is a no-op. Registering a different
// prefix or schema for a namespace that is already known, or reusing a
// prefix for a second namespace, is a `NamespaceConflict`.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::error::{PolicyError, PolicyResult};

/// A family of documents sharing one namespace table (e.g. common-policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentType {
    /// Registry key.
    pub name: &'static str,
    /// MIME type of serialized documents.
    pub content_type: &'static str,
}

/// One registered namespace of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    pub namespace: String,
    pub prefix: String,
    pub schema: Option<String>,
}

type Table = HashMap<&'static str, Vec<NamespaceEntry>>;

static NAMESPACES: OnceLock<RwLock<Table>> = OnceLock::new();

fn table() -> &'static RwLock<Table> {
    NAMESPACES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Associate `namespace` with `prefix` (and optionally a schema) for a document type.
pub fn register_namespace(
    document: DocumentType,
    namespace: &str,
    prefix: &str,
    schema: Option<&str>,
) -> PolicyResult<()> {
    if prefix.is_empty() || prefix.contains(':') || prefix == "xml" || prefix.starts_with("xmlns")
    {
        return Err(PolicyError::NamespaceConflict {
            namespace: namespace.to_string(),
            reason: format!("'{}' is not a usable prefix", prefix),
        });
    }

    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    let entries = table.entry(document.name).or_default();

    if let Some(existing) = entries.iter().find(|entry| entry.namespace == namespace) {
        if existing.prefix == prefix && existing.schema.as_deref() == schema {
            return Ok(());
        }
        return Err(PolicyError::NamespaceConflict {
            namespace: namespace.to_string(),
            reason: format!(
                "already registered for {} with prefix '{}'",
                document.name, existing.prefix
            ),
        });
    }
    if let Some(existing) = entries.iter().find(|entry| entry.prefix == prefix) {
        return Err(PolicyError::NamespaceConflict {
            namespace: namespace.to_string(),
            reason: format!("prefix '{}' is bound to '{}'", prefix, existing.namespace),
        });
    }

    tracing::debug!(document = document.name, namespace, prefix, "registered namespace");
    entries.push(NamespaceEntry {
        namespace: namespace.to_string(),
        prefix: prefix.to_string(),
        schema: schema.map(str::to_string),
    });
    Ok(())
}

/// All namespaces of a document type, in registration order.
pub fn namespaces_for(document: DocumentType) -> Vec<NamespaceEntry> {
    crate::document::init();
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(document.name)
        .cloned()
        .unwrap_or_default()
}

/// The prefix registered for a namespace, if any.
pub fn prefix_for(document: DocumentType, namespace: &str) -> Option<String> {
    namespaces_for(document)
        .into_iter()
        .find(|entry| entry.namespace == namespace)
        .map(|entry| entry.prefix)
}

/// The schema reference registered for a namespace, if any.
pub fn schema_for(document: DocumentType, namespace: &str) -> Option<String> {
    namespaces_for(document)
        .into_iter()
        .find(|entry| entry.namespace == namespace)
        .and_then(|entry| entry.schema)
}
