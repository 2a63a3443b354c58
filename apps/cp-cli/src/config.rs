// config.rs — Tool configuration loaded from .cp/policy.toml.
//
// Output settings for `fmt`, vendor extension kinds to accept as opaque
// elements, and extra namespace prefixes. Every table is optional; a missing
// file means defaults.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cp_policy::{Capability, QName, SerializeOptions, COMMON_POLICY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Serialization settings for written documents.
    #[serde(default)]
    pub output: SerializeOptions,

    /// Vendor kinds accepted as opaque extension elements.
    #[serde(default)]
    pub extensions: ExtensionsConfig,

    /// Extra namespace prefixes: prefix = namespace.
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
}

/// Qualified names in `{namespace}local` form, per extension point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub transformations: Vec<String>,
}

impl ToolConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// The configured extension kinds, parsed, with their extension point.
    pub fn extension_kinds(&self) -> anyhow::Result<Vec<(Capability, QName)>> {
        let points = [
            (Capability::Condition, &self.extensions.conditions),
            (Capability::Action, &self.extensions.actions),
            (Capability::Transformation, &self.extensions.transformations),
        ];
        let mut kinds = Vec::new();
        for (capability, names) in points {
            for name in names {
                let qname: QName = name
                    .parse()
                    .with_context(|| format!("bad {} kind in [extensions]", capability))?;
                if qname.namespace().is_empty() {
                    anyhow::bail!("{} kind '{}' has no namespace", capability, name);
                }
                kinds.push((capability, qname));
            }
        }
        Ok(kinds)
    }

    /// Register the configured namespaces and extension kinds.
    pub fn apply(&self) -> anyhow::Result<()> {
        cp_policy::init();
        for (prefix, namespace) in &self.namespaces {
            cp_policy::register_namespace(COMMON_POLICY, namespace, prefix, None)
                .with_context(|| format!("cannot register prefix '{}'", prefix))?;
        }
        for (capability, name) in self.extension_kinds()? {
            tracing::debug!(%capability, kind = %name, "accepting opaque extension kind");
            cp_policy::register_opaque(capability, name);
        }
        Ok(())
    }
}
