// document.rs — The common-policy document type and its one-time setup.
//
// `init()` fills the namespace and extension registries with the built-in
// entries. Every registry read calls it first, so callers only need it when
// they register their own kinds and want the built-ins present beforehand.
// The register functions never call `init()`.

use std::sync::Once;

use crate::extensions::{FalseCondition, RuleDisplayName};
use crate::namespace::{register_namespace, DocumentType};
use crate::registry::{register, Capability, ExtensionKind};

/// The common-policy namespace (RFC 4745).
pub const NAMESPACE: &str = "urn:ietf:params:xml:ns:common-policy";

/// Namespace of the agp-cp extension elements.
pub const AGP_NAMESPACE: &str = "urn:ag-projects:xml:ns:common-policy";

pub const CONTENT_TYPE: &str = "application/auth-policy+xml";

pub const COMMON_POLICY: DocumentType = DocumentType {
    name: "common-policy",
    content_type: CONTENT_TYPE,
};

static INIT: Once = Once::new();

/// Register the built-in namespaces and extension kinds. Idempotent.
pub fn init() {
    INIT.call_once(|| {
        let namespaces = [
            (NAMESPACE, "cp", Some("common-policy.xsd")),
            (AGP_NAMESPACE, "agp-cp", None),
        ];
        for (namespace, prefix, schema) in namespaces {
            if let Err(err) = register_namespace(COMMON_POLICY, namespace, prefix, schema) {
                tracing::warn!(error = %err, "built-in namespace registration failed");
            }
        }
        register(Capability::Condition, ExtensionKind::of::<FalseCondition>());
        register(Capability::RuleExtension, ExtensionKind::of::<RuleDisplayName>());
        tracing::info!(document = COMMON_POLICY.name, "common-policy registries initialized");
    });
}
