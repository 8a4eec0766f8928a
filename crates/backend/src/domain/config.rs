//! Runtime configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every section is `#[serde(default)]`, so a partial file is fine.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::cache::CacheDomain;
use crate::{
  dirs::{default_config_dir, default_silnlp_data, expand_home},
  error::ConfigError,
};

/// Default pattern for draft files, relative to the experiments root
pub const DEFAULT_TRANSLATION_GLOB: &str = "*/*/infer/*/*/*.SFM";
/// Default ceiling for simultaneous file operations
pub const DEFAULT_MAX_CONCURRENT_FILE_PROCESSING: usize = 10;
pub const VREF_FILE_NAME: &str = "vref.txt";

// ============================================================================
// Sections
// ============================================================================

/// Where the data lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
  /// SILNLP data root; `~` is expanded
  pub silnlp_data: PathBuf,

  /// Glob for draft files under `MT/experiments`
  pub translation_glob: String,

  /// Versification file. Default: `<silnlp_data>/MT/scripture/vref.txt`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vref_file: Option<PathBuf>,
}

impl Default for DataConfig {
  fn default() -> Self {
    Self {
      silnlp_data: default_silnlp_data(),
      translation_glob: DEFAULT_TRANSLATION_GLOB.to_string(),
      vref_file: None,
    }
  }
}

/// Startup scanning and caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Skip bulk scans at startup; every read is resolved lazily
  pub skip_heavy_operations_on_startup: bool,

  /// Global ceiling on in-flight file operations (minimum 1)
  pub max_concurrent_file_processing: usize,

  pub enable_scripture_cache: bool,
  pub enable_translation_cache: bool,
  pub enable_project_cache: bool,

  /// Seconds between periodic rescans while the daemon runs (0 = never)
  pub rescan_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      skip_heavy_operations_on_startup: false,
      max_concurrent_file_processing: DEFAULT_MAX_CONCURRENT_FILE_PROCESSING,
      enable_scripture_cache: true,
      enable_translation_cache: true,
      enable_project_cache: true,
      rescan_interval_secs: 0,
    }
  }
}

/// Logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  pub level: String,

  /// Directory for daemon log files. Unset logs to stderr only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub directory: Option<PathBuf>,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  pub rotation: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  #[serde(default)]
  pub data: DataConfig,

  #[serde(default)]
  pub cache: CacheConfig,

  #[serde(default)]
  pub log: LogConfig,
}

impl Config {
  /// Load the config file (if any) and apply environment overrides.
  pub fn load() -> Result<Self, ConfigError> {
    let path = Self::config_path();
    let mut config = if path.exists() {
      Self::load_file(&path)?
    } else {
      Self::default()
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
  }

  /// Config file location: `SILAUTO_CONFIG`, else `config.toml` in the config dir.
  pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SILAUTO_CONFIG") {
      return PathBuf::from(path);
    }
    default_config_dir().join("config.toml")
  }

  pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Override fields from environment-style variables.
  ///
  /// Booleans are true only when the value lower-cased is `"true"`. Integers
  /// that fail to parse are ignored and the previous value is kept.
  pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup("SILNLP_DATA") {
      self.data.silnlp_data = expand_home(Path::new(&path));
    }
    if let Some(glob) = lookup("TRANSLATION_GLOB") {
      self.data.translation_glob = glob;
    }
    if let Some(path) = lookup("VREF_FILE") {
      self.data.vref_file = Some(PathBuf::from(path));
    }

    if let Some(value) = lookup("SKIP_HEAVY_OPERATIONS_ON_STARTUP") {
      self.cache.skip_heavy_operations_on_startup = env_flag(&value);
    }
    if let Some(value) = parse_number(&lookup, "MAX_CONCURRENT_FILE_PROCESSING") {
      self.cache.max_concurrent_file_processing = value as usize;
    }
    for domain in CacheDomain::ALL {
      if let Some(value) = lookup(domain.enable_var()) {
        *self.cache.enable_flag_mut(domain) = env_flag(&value);
      }
    }
    if let Some(value) = parse_number(&lookup, "CACHE_RESCAN_INTERVAL_SECS") {
      self.cache.rescan_interval_secs = value;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
      self.log.level = level;
    }
    if let Some(dir) = lookup("LOG_DIR") {
      self.log.directory = Some(PathBuf::from(dir));
    }
  }

  /// SILNLP data root with `~` expanded.
  pub fn data_root(&self) -> PathBuf {
    expand_home(&self.data.silnlp_data)
  }

  /// Directory scanned for a domain.
  pub fn domain_root(&self, domain: CacheDomain) -> PathBuf {
    let root = self.data_root();
    match domain {
      CacheDomain::Scripture => root.join("MT").join("scripture"),
      CacheDomain::Translation => root.join("MT").join("experiments"),
      CacheDomain::Project => root.join("Paratext").join("projects"),
    }
  }

  pub fn vref_path(&self) -> PathBuf {
    match &self.data.vref_file {
      Some(path) => expand_home(path),
      None => self.domain_root(CacheDomain::Scripture).join(VREF_FILE_NAME),
    }
  }

  pub fn is_enabled(&self, domain: CacheDomain) -> bool {
    match domain {
      CacheDomain::Scripture => self.cache.enable_scripture_cache,
      CacheDomain::Translation => self.cache.enable_translation_cache,
      CacheDomain::Project => self.cache.enable_project_cache,
    }
  }

  pub fn max_concurrent(&self) -> usize {
    self.cache.max_concurrent_file_processing.max(1)
  }

  pub fn rescan_interval(&self) -> Option<Duration> {
    (self.cache.rescan_interval_secs > 0).then(|| Duration::from_secs(self.cache.rescan_interval_secs))
  }

  /// Render the effective configuration as TOML.
  pub fn to_toml(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }
}

impl CacheConfig {
  fn enable_flag_mut(&mut self, domain: CacheDomain) -> &mut bool {
    match domain {
      CacheDomain::Scripture => &mut self.enable_scripture_cache,
      CacheDomain::Translation => &mut self.enable_translation_cache,
      CacheDomain::Project => &mut self.enable_project_cache,
    }
  }
}

fn env_flag(value: &str) -> bool {
  value.to_lowercase() == "true"
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
  let raw = lookup(key)?;
  match raw.trim().parse::<u64>() {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(key, value = %raw, error = %e, "Ignoring invalid integer in environment");
      None
    }
  }
}
