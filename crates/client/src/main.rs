//! filejob client - worker entry point
//!
//! Claims one command at a time from `<basedir>/todo.txt`, runs it through the
//! shell, and records it in `done.txt` once it exits.

mod config;
mod logging;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use filejob_core::application::{shutdown_channel, Worker};
use filejob_core::port::sleeper::TokioSleeper;
use filejob_core::port::time_provider::SystemTimeProvider;
use filejob_core::port::{Sleeper, TimeProvider};
use filejob_infra_fs::{FileQueueStore, QueueLayout};
use filejob_infra_system::ShellExecutor;

use config::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Initialize logging
    logging::init(args.log_format)?;
    info!("filejob client v{} starting...", filejob_core::VERSION);

    // 2. Load configuration
    let basedir = args.basedir_path();
    let worker_config = args.worker_config();
    info!(
        basedir = %basedir.display(),
        max_jobs = worker_config.max_jobs,
        on_shutdown = %worker_config.on_shutdown,
        shell = %args.shell.display(),
        "Opening queue directory"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    // 4. Wire shutdown signals (a wait on a stale lock must stay interruptible)
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    signals::install(shutdown_tx).context("Failed to install signal handlers")?;

    let store = FileQueueStore::open(
        QueueLayout::new(&basedir),
        args.store_options(),
        time_provider.clone(),
        sleeper.clone(),
    )
    .await
    .with_context(|| format!("Failed to open queue directory {}", basedir.display()))?
    .with_shutdown(shutdown_rx.clone());

    let executor = ShellExecutor::new(time_provider, args.shell.clone());

    // 5. Run until halted
    let mut worker = Worker::new(Arc::new(store), Arc::new(executor), sleeper, worker_config);

    match worker.run(shutdown_rx).await {
        Ok(reason) => {
            info!(
                finished = worker.finished_count(),
                "Client exiting: {}", reason
            );
            Ok(())
        }
        Err(e) if e.is_integrity_violation() => {
            error!(
                error = %e,
                basedir = %basedir.display(),
                "Queue lists disagree with this client; inspect todo.txt, doing.txt and done.txt before restarting workers"
            );
            Err(anyhow::Error::new(e).context("Queue integrity violation"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Worker failed")),
    }
}
