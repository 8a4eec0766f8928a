//! One-shot health check

use anyhow::Result;

use crate::format;

/// Run the startup scans once and show per-domain health
pub async fn cmd_health(json: bool) -> Result<()> {
  let config = super::load_config()?;
  let orchestrator = super::scanned_orchestrator(&config).await?;
  let health = orchestrator.health();
  orchestrator.shutdown().await;

  if json {
    println!("{}", serde_json::to_string_pretty(&health)?);
  } else {
    println!("Cache Health");
    println!("============\n");
    print!("{}", format::format_health(&health));
  }

  if health.domains.iter().any(|d| d.root_error.is_some()) {
    std::process::exit(1);
  }
  Ok(())
}
