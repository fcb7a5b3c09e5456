//! Handler for the `run` command: the scheduler daemon.

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::application::scheduler::{Scheduler, SchedulerDeps};
use crate::error::Result;

use super::App;

pub async fn execute(database: Option<String>) -> Result<()> {
    // Degraded start: the process stays up even when the database is
    // unreachable; jobs fail until it returns.
    let app = App::bootstrap(database, true)?;

    let scheduler = Scheduler::start(SchedulerDeps {
        scanner: app.scanner.clone(),
        reconciler: Arc::clone(&app.reconciler),
        config: app.config.clone(),
        notifier: app.notifier.clone(),
        store: app.store.clone(),
    });

    info!("augur running, ctrl-c to stop");
    signal::ctrl_c().await?;
    info!("shutdown signal received");

    // Does not wait for in-flight jobs.
    scheduler.shutdown();
    Ok(())
}
