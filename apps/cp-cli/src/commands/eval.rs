// eval.rs — `cpctl match`: which rules apply to a requester.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use cp_policy::{PolicyEngine, PolicyRequest};

/// Arguments of `cpctl match`.
pub struct MatchArgs<'a> {
    pub file: &'a Path,
    pub identity: &'a str,
    pub sphere: Option<&'a str>,
    pub at: Option<&'a str>,
    pub trace: bool,
}

pub fn execute(args: &MatchArgs<'_>) -> anyhow::Result<()> {
    println!("{}", render(args)?);
    Ok(())
}

fn render(args: &MatchArgs<'_>) -> anyhow::Result<String> {
    let engine = PolicyEngine::new(super::read_ruleset(args.file)?);

    let mut request = PolicyRequest::new(args.identity);
    if let Some(sphere) = args.sphere {
        request = request.with_sphere(sphere);
    }
    if let Some(at) = args.at {
        let at = DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("--at '{}' is not an RFC 3339 date-time", at))?;
        request = request.at(at.with_timezone(&Utc));
    }

    if args.trace {
        let trace = engine.evaluate_with_trace(&request);
        return Ok(serde_json::to_string_pretty(&trace)?);
    }

    let applicable = engine.evaluate(&request);
    if applicable.is_empty() {
        return Ok(format!("No rule applies to {}.", args.identity));
    }
    Ok(applicable.join("\n"))
}
