//! CLI command implementations

mod config;
mod daemon;
mod diagnose;
mod health;
mod list;
mod resolve;

pub use config::cmd_config_show;
pub use daemon::cmd_daemon;
pub use diagnose::cmd_diagnose;
pub use health::cmd_health;
pub use list::cmd_list;
pub use resolve::cmd_resolve;

use anyhow::{Context, Result};
use silauto::{CacheOrchestrator, config::Config};
use tokio_util::sync::CancellationToken;

fn load_config() -> Result<Config> {
  Config::load().with_context(|| format!("Failed to load configuration from {:?}", Config::config_path()))
}

/// Build an orchestrator, run the startup scans and wait for them to settle.
async fn scanned_orchestrator(config: &Config) -> Result<CacheOrchestrator> {
  let orchestrator =
    CacheOrchestrator::from_config(config, CancellationToken::new()).context("Failed to build scanners")?;
  orchestrator.start();
  orchestrator.wait_startup_settled().await;
  Ok(orchestrator)
}
