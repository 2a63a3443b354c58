pub mod check;
pub mod eval;
pub mod fmt;

use std::path::Path;

use anyhow::Context;
use cp_policy::RuleSet;

/// Read and parse a policy document.
pub(crate) fn read_ruleset(path: &Path) -> anyhow::Result<RuleSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    RuleSet::from_xml(&content).with_context(|| format!("failed to parse {}", path.display()))
}
