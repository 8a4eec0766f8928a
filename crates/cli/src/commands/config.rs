//! Configuration commands

use anyhow::{Context, Result};
use silauto::config::Config;

/// Show the effective configuration
pub fn cmd_config_show() -> Result<()> {
  let path = Config::config_path();
  let config = super::load_config()?;

  if path.exists() {
    println!("Using config file: {:?}", path);
  } else {
    println!("Using default configuration (no config file at {:?})", path);
  }
  println!("Data root: {:?}", config.data_root());
  println!();

  let toml_str = config.to_toml().context("Failed to render configuration")?;
  println!("{}", toml_str);

  Ok(())
}
