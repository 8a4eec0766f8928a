use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::CacheOrchestrator;
use crate::{error::RescanError, model::CacheDomain};

/// Periodically rescans every enabled domain while the daemon runs.
#[derive(Debug)]
pub struct RescanScheduler {
  orchestrator: CacheOrchestrator,
  interval: Duration,
}

impl RescanScheduler {
  pub fn new(orchestrator: CacheOrchestrator, interval: Duration) -> Self {
    Self { orchestrator, interval }
  }

  /// Run until cancelled.
  pub async fn run(self, cancel: CancellationToken) {
    let mut timer = tokio::time::interval(self.interval);
    // Skip the immediate tick
    timer.tick().await;

    info!(interval_secs = self.interval.as_secs(), "Rescan scheduler started");

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          info!("Rescan scheduler shutting down (cancelled)");
          break;
        }

        _ = timer.tick() => {
          self.rescan_enabled();
        }
      }
    }
  }

  fn rescan_enabled(&self) {
    for domain in CacheDomain::ALL {
      if !self.orchestrator.mode(domain).is_enabled() {
        continue;
      }
      match self.orchestrator.rescan(domain) {
        Ok(()) => debug!(domain = %domain, "Scheduled rescan launched"),
        Err(RescanError::AlreadyRunning(_)) => debug!(domain = %domain, "Scan still running, skipping scheduled rescan"),
        Err(e) => warn!(domain = %domain, error = %e, "Scheduled rescan not started"),
      }
    }
  }
}
