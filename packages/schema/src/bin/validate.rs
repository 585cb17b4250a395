//! Validate stored extraction output against a record schema.
//!
//! Prints the normalised record for each valid file and one line per failing
//! field otherwise. Exits with status 1 when any file fails.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use docextract_schema::{validate, RecordKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docextract-validate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Record type: identity-document, invoice or itemized-invoice
    #[arg(short, long)]
    kind: RecordKind,

    /// JSON files produced by the extraction step
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn validate_file(path: &Path, kind: RecordKind) -> Result<String, Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| vec![format!("read: {e}")])?;
    let raw: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| vec![format!("json parse: {e}")])?;

    let record = validate(&raw, kind)
        .map_err(|err| err.errors.iter().map(ToString::to_string).collect::<Vec<_>>())?;

    serde_json::to_string_pretty(&record).map_err(|e| vec![format!("serialize: {e}")])
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut failed = false;

    for path in &cli.files {
        match validate_file(path, cli.kind) {
            Ok(json) => {
                println!("OK: {}", path.display());
                println!("{json}");
            }
            Err(errors) => {
                failed = true;
                for error in errors {
                    eprintln!("FAIL: {}: {error}", path.display());
                }
            }
        }
    }

    if failed {
        process::exit(1);
    }
}
