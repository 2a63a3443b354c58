// check.rs — `cpctl check`: parse and validate a document.
//
// Prints the document type, the rules with their display names, and the
// vendor kinds the config made acceptable.

use std::fmt::Write as _;
use std::path::Path;

use cp_policy::{Element, COMMON_POLICY};

use crate::config::ToolConfig;

pub fn execute(file: &Path, config: &ToolConfig) -> anyhow::Result<()> {
    print!("{}", render(file, config)?);
    Ok(())
}

fn render(file: &Path, config: &ToolConfig) -> anyhow::Result<String> {
    let ruleset = super::read_ruleset(file)?;
    if let Err(e) = ruleset.check_validity() {
        println!("{}: INVALID", file.display());
        println!("  {}", e);
        anyhow::bail!("{} failed validation", file.display());
    }

    let mut out = String::new();
    writeln!(
        out,
        "{}: {}, {} rule(s)",
        file.display(),
        COMMON_POLICY.content_type,
        ruleset.len()
    )?;
    for rule in &ruleset {
        match rule.display_name().and_then(|name| name.value()) {
            Some(name) => writeln!(out, "  {}  ({})", rule.id(), name)?,
            None => writeln!(out, "  {}", rule.id())?,
        }
    }

    let kinds = config.extension_kinds()?;
    if !kinds.is_empty() {
        writeln!(out, "Vendor kinds accepted from config:")?;
        for (capability, name) in kinds {
            writeln!(out, "  {} {}", capability, name)?;
        }
    }
    Ok(out)
}
