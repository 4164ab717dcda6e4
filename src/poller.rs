//! Periodic status reconciliation.
//!
//! Pulled out of the UI layer so its cancellation and overlap semantics
//! are independently testable. Each tick awaits `refresh_all` to
//! completion before the next tick can fire, and missed ticks are skipped
//! rather than queued — at most one status request is ever in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::manager::ConnectionManager;

/// Drives `ConnectionManager::refresh_all` on a fixed interval.
pub struct StatusPoller {
    manager: Arc<ConnectionManager>,
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager, handle: None }
    }

    /// Start polling. A running poller is restarted with the new interval.
    /// The first refresh fires one interval after start; callers seed the
    /// initial snapshot with an explicit `refresh_all`.
    pub fn start(&mut self, interval: Duration) {
        self.stop();

        let manager = Arc::clone(&self.manager);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // consume the immediate first tick

            loop {
                ticker.tick().await;
                debug!("poller tick: refreshing connection status");
                manager.refresh_all().await;
            }
        });

        self.handle = Some(handle);
        info!(interval_ms = interval.as_millis() as u64, "status poller started");
    }

    /// Stop polling. No tick fires after this returns; an in-flight
    /// refresh is cancelled at its next await point.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("status poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
