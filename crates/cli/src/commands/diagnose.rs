//! Startup bottleneck diagnostics

use anyhow::{Context, Result};
use silauto::{ConcurrencyLimiter, ScannerSet, run_diagnostics};

use crate::format;

/// Check every domain root and time each scanner in isolation
pub async fn cmd_diagnose(json: bool) -> Result<()> {
  let config = super::load_config()?;
  let scanners = ScannerSet::from_config(&config).context("Failed to build scanners")?;
  let limiter = ConcurrencyLimiter::new(config.max_concurrent());

  if !json {
    println!("Startup Diagnostics");
    println!("===================\n");
    println!("Data root:    {:?}", config.data_root());
    println!("Concurrency:  {}", limiter.capacity());
    println!();
  }

  let report = run_diagnostics(&scanners, &limiter).await;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print!("{}", format::format_diagnostics(&report));
  }
  Ok(())
}
