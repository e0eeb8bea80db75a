//! filejob CLI - queue directory administration
//!
//! Producer and operator actions that go through the same lock as the workers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use filejob_core::domain::{Job, QueueList, QueueSnapshot};
use filejob_core::port::sleeper::TokioSleeper;
use filejob_core::port::time_provider::SystemTimeProvider;
use filejob_core::port::QueueStore;
use filejob_infra_fs::{FileQueueStore, LockOptions, QueueLayout, StoreOptions};

#[derive(Parser)]
#[command(name = "filejob")]
#[command(about = "filejob queue directory administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Give up waiting for the queue lock after this many seconds
    #[arg(long, global = true, env = "FILEJOB_LOCK_TIMEOUT_SECS")]
    lock_timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append commands to todo.txt (reads stdin, one per line, when none are given)
    Enqueue {
        /// Queue directory
        basedir: String,

        /// Shell commands to queue
        commands: Vec<String>,
    },

    /// Show list sizes and running jobs
    Status {
        /// Queue directory
        basedir: String,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a stale .lock left by a crashed worker
    Unlock {
        /// Queue directory
        basedir: String,
    },
}

#[derive(Tabled)]
struct ListRow {
    list: String,
    file: &'static str,
    jobs: usize,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    basedir: String,
    locked: bool,
    #[serde(flatten)]
    snapshot: &'a QueueSnapshot,
}

/// Diagnostics go to stderr so `status --json` output stays clean
fn init_logging() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("filejob=warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

async fn open_store(basedir: &str, lock_timeout_secs: Option<u64>) -> Result<FileQueueStore> {
    let basedir = PathBuf::from(shellexpand::tilde(basedir).into_owned());
    let options = StoreOptions {
        lock: LockOptions {
            timeout: lock_timeout_secs.map(Duration::from_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    FileQueueStore::open(
        QueueLayout::new(&basedir),
        options,
        Arc::new(SystemTimeProvider),
        Arc::new(TokioSleeper),
    )
    .await
    .with_context(|| format!("Failed to open queue directory {}", basedir.display()))
}

/// Validate command lines, skipping blank ones
fn parse_jobs<I, S>(lines: I) -> Result<Vec<Job>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|line| !line.as_ref().trim().is_empty())
        .map(|line| Job::new(line.as_ref()).context("Invalid command"))
        .collect()
}

async fn read_stdin_lines() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        out.push(line);
    }
    Ok(out)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Commands::Enqueue { basedir, commands } => {
            let lines = if commands.is_empty() {
                read_stdin_lines().await.context("Failed to read stdin")?
            } else {
                commands
            };
            let jobs = parse_jobs(&lines)?;

            let store = open_store(&basedir, cli.lock_timeout_secs).await?;
            let added = store.enqueue(&jobs).await?;

            println!(
                "{}",
                format!("✓ {} job(s) enqueued", added).green().bold()
            );
        }

        Commands::Status { basedir, json } => {
            let store = open_store(&basedir, cli.lock_timeout_secs).await?;
            let locked = store.lock().is_locked().await?;
            let snapshot = store.snapshot().await?;

            if json {
                let report = StatusReport {
                    basedir: store.layout().basedir().display().to_string(),
                    locked,
                    snapshot: &snapshot,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("{}", "Queue Status".cyan().bold());
            println!();
            println!(
                "  {} {}",
                "Directory:".bold(),
                store.layout().basedir().display()
            );
            let lock_state = if locked {
                "HELD".yellow()
            } else {
                "FREE".green()
            };
            println!("  {} {}", "Lock:".bold(), lock_state);
            println!();

            let rows: Vec<ListRow> = QueueList::ALL
                .iter()
                .map(|list| ListRow {
                    list: list.to_string(),
                    file: list.file_name(),
                    jobs: snapshot.list(*list).len(),
                })
                .collect();
            println!("{}", Table::new(rows));

            if !snapshot.in_progress.is_empty() {
                println!();
                println!("{}", "Running:".bold());
                for job in &snapshot.in_progress {
                    println!("  • {}", job);
                }
            }
        }

        Commands::Unlock { basedir } => {
            let store = open_store(&basedir, cli.lock_timeout_secs).await?;

            if store.lock().break_lock().await? {
                println!(
                    "{}",
                    format!("✓ Removed {}", store.layout().lock_path().display()).green()
                );
                println!(
                    "  {} make sure no worker was inside its critical section",
                    "!".yellow().bold()
                );
            } else {
                println!("{}", "○ Queue directory was not locked".yellow());
            }
        }
    }

    Ok(())
}
