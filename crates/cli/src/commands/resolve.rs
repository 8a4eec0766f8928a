//! On-demand resolution of a single item

use anyhow::{Context, Result, anyhow};
use silauto::{CacheOrchestrator, model::CacheDomain};
use tokio_util::sync::CancellationToken;

use crate::format;

/// Compute one item without scanning its domain
pub async fn cmd_resolve(domain: &str, key: &str, json: bool) -> Result<()> {
  let domain: CacheDomain = domain.parse().map_err(|e: String| anyhow!(e))?;
  let config = super::load_config()?;

  // No startup scans: the item is located and computed on its own
  let orchestrator =
    CacheOrchestrator::from_config(&config, CancellationToken::new()).context("Failed to build scanners")?;
  let result = orchestrator.resolve(domain, key).await;
  orchestrator.shutdown().await;

  let resolution = result.with_context(|| format!("Failed to resolve {domain} {key:?}"))?;

  if json {
    println!("{}", serde_json::to_string_pretty(resolution.entry.as_ref())?);
  } else {
    print!("{}", format::format_entry(&resolution.entry));
  }
  Ok(())
}
