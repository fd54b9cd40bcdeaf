//! Hotswap Daemon - Governance and execution service
//!
//! The hotswap daemon provides:
//! - The approval gate with its periodic expiry sweep
//! - The supervised execution queue
//! - Offline tools to preview a change's classification and verify an
//!   audit trail

use anyhow::Context;
use clap::{Parser, Subcommand};
use hotswap_audit::{verify_chain, ChainViolation, FileAuditSink};
use hotswap_classifier::{ChangeClassifier, Classification};
use hotswap_daemon::{DaemonConfig, Server};
use hotswap_types::{ProposedChange, SchemaDefinition};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hotswap Daemon CLI
#[derive(Parser)]
#[command(name = "hotswapd")]
#[command(about = "Hotswap Daemon - Change governance and execution", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HOTSWAP_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "HOTSWAP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HOTSWAP_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default)
    Run,

    /// Classify a change without recording anything
    Preview {
        /// Proposed change (JSON)
        change: PathBuf,

        /// Subject's current schema (JSON); omit for a first version
        #[arg(long)]
        baseline: Option<PathBuf>,
    },

    /// Verify the hash chain of a JSON-lines audit file
    VerifyAudit {
        /// Audit file path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                audit = ?config.audit,
                "Starting hotswap daemon"
            );
            let server = Server::new(config).await?;
            let report = server.run().await?;
            tracing::info!(
                processed = report.processed,
                still_queued = report.still_queued,
                forced = report.forced,
                "hotswap daemon stopped"
            );
        }
        Command::Preview { change, baseline } => {
            let change: ProposedChange = read_json(&change).await?;
            let baseline: Option<SchemaDefinition> = match baseline {
                Some(path) => Some(read_json(&path).await?),
                None => None,
            };

            let classifier = ChangeClassifier::new(config.classifier);
            match classifier.classify(&change, baseline.as_ref()) {
                Classification::NoApprovalNeeded { reason } => {
                    println!("{}: no approval needed ({})", change.subject_id, reason);
                }
                Classification::ApprovalRequired(details) => {
                    println!(
                        "{}: {} approval required ({})",
                        change.subject_id, details.level, details.reason
                    );
                    for breaking in &details.breaking_changes {
                        println!("  - {}", breaking);
                    }
                }
            }
        }
        Command::VerifyAudit { path } => {
            let entries = FileAuditSink::open(path.clone())
                .await?
                .read_all()
                .await?;
            let verification = verify_chain(&entries);

            match verification.violation {
                None => println!(
                    "{}: {} entries, chain intact",
                    path.display(),
                    verification.total_entries
                ),
                Some(ChainViolation::TamperedEntry { index, .. }) => {
                    anyhow::bail!("entry {} does not match its hash", index)
                }
                Some(ChainViolation::BrokenLink { index, .. }) => {
                    anyhow::bail!("entry {} does not link to its predecessor", index)
                }
            }
        }
    }

    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
