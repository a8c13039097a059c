//! Batch Authorization CLI
//!
//! Runs one batch request against a policy set and entity graph loaded from
//! JSON files and prints a result per variable combination.
//!
//! Usage:
//!   cargo run --features cli --bin batch_cli -- \
//!     --policies policies.json \
//!     --entities entities.json \
//!     --request request.json \
//!     --format table
//!
//! The request file holds the four slots and the candidate lists. A variable
//! placeholder is written as an entity of type `__cedar::variable`:
//!
//! ```json
//! {
//!   "principal": { "__entity": { "type": "__cedar::variable", "id": "who" } },
//!   "action": { "__entity": { "type": "Action", "id": "view" } },
//!   "resource": { "__entity": { "type": "Doc", "id": "1" } },
//!   "context": {},
//!   "variables": {
//!     "who": [ { "__entity": { "type": "User", "id": "alice" } } ]
//!   }
//! }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use authz_batch::{BatchConfig, BatchRequest, BatchResult, BatchRunner};
use authz_types::{Decision, Entities, PolicySet};

/// Evaluate every variable combination of a templated authorization request
#[derive(Parser, Debug)]
#[command(name = "batch_cli")]
#[command(about = "Batch authorization over templated requests")]
struct Args {
    /// Policy set (JSON array of policies)
    #[arg(long, short = 'p')]
    policies: PathBuf,

    /// Entity graph (JSON array of entities)
    #[arg(long, short = 'e')]
    entities: PathBuf,

    /// Batch request template (JSON)
    #[arg(long, short = 'r')]
    request: PathBuf,

    /// YAML config file (default: AUTHZ_BATCH_* environment variables)
    #[arg(long, short = 'c', env = "AUTHZ_BATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Disable partial-evaluation pruning
    #[arg(long)]
    no_prune: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One JSON object per line
    Json,
    /// Colored table
    Table,
}

#[derive(Debug, Default)]
struct Summary {
    allowed: usize,
    denied: usize,
}

impl Summary {
    fn record(&mut self, result: &BatchResult) {
        match result.decision {
            Decision::Allow => self.allowed += 1,
            Decision::Deny => self.denied += 1,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} in {}", what, path.display()))
}

fn print_header(out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "{:<6}  {:<40}  {}",
        "RESULT".bold(),
        "VALUES".bold(),
        "POLICIES".bold()
    )
}

fn print_row(out: &mut impl Write, result: &BatchResult) -> io::Result<()> {
    let decision = match result.decision {
        Decision::Allow => "ALLOW".green().bold(),
        Decision::Deny => "DENY".red().bold(),
    };
    let values = result
        .values
        .iter()
        .map(|(name, value)| {
            let json = serde_json::to_string(value).unwrap_or_else(|_| "?".to_string());
            format!("{}={}", name, json)
        })
        .collect::<Vec<_>>()
        .join(" ");
    let reasons = result
        .diagnostic
        .policy_ids()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{:<6}  {:<40}  {}", decision, values, reasons.dimmed())
}

fn print_result(out: &mut impl Write, format: Format, result: &BatchResult) -> io::Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer(&mut *out, result)?;
            writeln!(out)
        }
        Format::Table => print_row(out, result),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BatchConfig::from_yaml_file(path)?,
        None => BatchConfig::from_env(),
    };
    if args.no_prune {
        config.prune = false;
    }

    let policies: PolicySet = read_json(&args.policies, "policies")?;
    let entities: Entities = read_json(&args.entities, "entities")?;
    let request: BatchRequest = read_json(&args.request, "request")?;
    let format = args.format;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let start = Instant::now();
    let (outcome, summary, write_error) = tokio::task::spawn_blocking(move || {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut summary = Summary::default();
        let mut write_error = None;

        if format == Format::Table {
            if let Err(e) = print_header(&mut out) {
                write_error = Some(e);
            }
        }
        let outcome = BatchRunner::new(config).run(&cancel, &policies, &entities, request, |result| {
            summary.record(&result);
            if write_error.is_none() {
                if let Err(e) = print_result(&mut out, format, &result) {
                    write_error = Some(e);
                }
            }
        });
        (outcome, summary, write_error)
    })
    .await
    .context("Batch task failed")?;
    ctrl_c.abort();

    eprintln!(
        "{} {} results ({} allowed, {} denied) in {:?}",
        "Done:".cyan().bold(),
        summary.allowed + summary.denied,
        summary.allowed.to_string().green(),
        summary.denied.to_string().red(),
        start.elapsed()
    );

    if let Some(e) = write_error {
        return Err(e).context("Failed to write results");
    }
    outcome.context("Batch did not complete")
}
