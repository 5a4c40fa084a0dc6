//! Store Cleanup Task
//!
//! Background task that periodically frees expired values held by the
//! in-process backing store and drops idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{MemoryStore, SessionRegistry};

/// Spawns a task that calls `MemoryStore::cleanup_expired` and
/// `SessionRegistry::expire_idle` every `cleanup_interval_secs` seconds.
///
/// Returns the task's handle so shutdown can abort it.
pub fn spawn_cleanup_task(
    store: Arc<MemoryStore>,
    sessions: Arc<SessionRegistry>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting store cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match store.cleanup_expired() {
                Ok(0) => debug!("Store cleanup: no expired namespaces"),
                Ok(removed) => info!("Store cleanup: removed {} expired namespaces", removed),
                Err(e) => warn!("Store cleanup failed: {}", e),
            }

            match sessions.expire_idle() {
                Ok(0) => {}
                Ok(removed) => info!("Session cleanup: dropped {} idle sessions", removed),
                Err(e) => warn!("Session cleanup failed: {}", e),
            }
        }
    })
}
