//! Daemon lifecycle.
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Build the `CacheOrchestrator` with a child token
//! 3. Launch startup scans (unless skipped) and return immediately
//! 4. Spawn the optional `RescanScheduler`
//! 5. Wait for ctrl-c or external cancellation
//! 6. Graceful shutdown: stop the scheduler, abandon scans, wait for tasks

use std::path::PathBuf;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  cache::{CacheOrchestrator, RescanScheduler},
  config::Config,
  error::ConfigError,
  model::CacheDomain,
};

// ============================================================================
// Configuration
// ============================================================================

/// Daemon runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Where the config was read from (may not exist)
  pub config_path: PathBuf,
  /// Config file merged with environment overrides
  pub config: Config,
}

impl RuntimeConfig {
  pub fn load() -> Result<Self, ConfigError> {
    Ok(Self {
      config_path: Config::config_path(),
      config: Config::load()?,
    })
  }
}

/// The cache daemon: populates caches at startup and keeps them fresh.
///
/// ```ignore
/// let daemon = Daemon::new(RuntimeConfig::load()?);
/// daemon.run(CancellationToken::new()).await?;
/// ```
pub struct Daemon {
  runtime_config: RuntimeConfig,
}

impl Daemon {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self { runtime_config }
  }

  /// Run until `cancel` fires or ctrl-c is received.
  pub async fn run(self, cancel: CancellationToken) -> Result<(), ConfigError> {
    let config = &self.runtime_config.config;

    info!("Starting silauto cache daemon");
    info!(path = %self.runtime_config.config_path.display(), "Config");
    info!(path = %config.data_root().display(), "Data root");

    let orchestrator = CacheOrchestrator::from_config(config, cancel.child_token())?;

    let launched = orchestrator.start();
    for domain in CacheDomain::ALL {
      if !orchestrator.mode(domain).is_enabled() {
        info!(domain = %domain, "Cache disabled, every read recomputes");
      }
    }
    if launched.is_empty() {
      info!("No startup scans launched, items will be resolved on demand");
    }

    // Log a health summary once startup scans settle
    let settle_handle = {
      let orchestrator = orchestrator.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move {
        tokio::select! {
          _ = cancel.cancelled() => {}
          _ = orchestrator.wait_startup_settled() => log_health(&orchestrator),
        }
      })
    };

    let scheduler_handle = config.rescan_interval().map(|interval| {
      let orchestrator = orchestrator.clone();
      let cancel = cancel.child_token();
      tokio::spawn(async move {
        RescanScheduler::new(orchestrator, interval).run(cancel).await;
      })
    });

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    cancel.cancelled().await;

    info!("Shutting down...");
    let _ = settle_handle.await;
    if let Some(handle) = scheduler_handle {
      let _ = handle.await;
    }
    orchestrator.shutdown().await;

    info!("Daemon shutdown complete");
    Ok(())
  }
}

fn log_health(orchestrator: &CacheOrchestrator) {
  let health = orchestrator.health();
  for domain in &health.domains {
    info!(
      domain = %domain.domain,
      status = %domain.status,
      items = domain.item_count,
      failures = domain.failure_count,
      duration_ms = domain.last_scan_duration_ms,
      "Domain ready"
    );
    if let Some(error) = &domain.root_error {
      warn!(domain = %domain.domain, error = %error, "Domain root unavailable");
    }
  }
}
