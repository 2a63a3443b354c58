//! # cp-cli
//!
//! Command-line interface for common-policy (RFC 4745) documents.
//!
//! - `cpctl check <file>` — parse and validate, list the rules
//! - `cpctl fmt <file>` — rewrite in canonical order
//! - `cpctl match <file> <identity>` — which rules apply to a requester

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::ToolConfig;

/// Inspect and evaluate common-policy documents.
#[derive(Parser)]
#[command(name = "cpctl", version, about)]
struct Cli {
    /// Tool configuration file (missing file means defaults).
    #[arg(long, global = true, default_value = ".cp/policy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a document.
    Check {
        /// Policy document (application/auth-policy+xml).
        file: PathBuf,
    },
    /// Re-serialize a document in canonical order.
    Fmt {
        file: PathBuf,
        /// Write here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the ids of the rules that apply to a requester.
    Match {
        file: PathBuf,
        /// Requester identifier, e.g. sip:alice@example.com.
        identity: String,
        /// The presentity's current sphere.
        #[arg(long)]
        sphere: Option<String>,
        /// Evaluation time as RFC 3339 (defaults to now).
        #[arg(long)]
        at: Option<String>,
        /// Print the full evaluation trace as JSON.
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't mix with document output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cp_policy=info".parse()?))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = ToolConfig::load_or_default(&cli.config)?;
    config.apply()?;

    match &cli.command {
        Commands::Check { file } => commands::check::execute(file, &config),
        Commands::Fmt { file, output } => commands::fmt::execute(file, output.as_deref(), &config),
        Commands::Match {
            file,
            identity,
            sphere,
            at,
            trace,
        } => commands::eval::execute(&commands::eval::MatchArgs {
            file,
            identity,
            sphere: sphere.as_deref(),
            at: at.as_deref(),
            trace: *trace,
        }),
    }
}
