//! Background credential sweep task
//!
//! A detached tokio task that periodically runs the directory's sweep
//! pass. The startup tick is skipped: `load_all` has just validated
//! everything, so the first real sweep happens one full interval later.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::directory::AccountDirectory;

/// Spawn the periodic sweep. Abort the returned handle to stop it.
pub fn spawn_sweep_task(
    directory: Arc<AccountDirectory>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately on creation; swallow that tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("running credential sweep");
            directory.periodic_sweep().await;
        }
    })
}
