//! Daemon command

use anyhow::{Context, Result};
use silauto::{Daemon, RuntimeConfig};
use tokio_util::sync::CancellationToken;

/// Run the cache daemon in the foreground until ctrl-c
pub async fn cmd_daemon() -> Result<()> {
  let runtime_config = RuntimeConfig::load().context("Failed to load configuration")?;
  Daemon::new(runtime_config)
    .run(CancellationToken::new())
    .await
    .context("Failed to run daemon")?;

  Ok(())
}
