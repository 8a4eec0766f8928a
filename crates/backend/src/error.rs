//! Error taxonomy for the cache subsystem.
//!
//! - [`ItemError`]: one candidate failed. Isolated to its key and recorded in
//!   the scan report; the domain ends `Degraded` instead of `Complete`.
//! - [`DomainRootError`]: the domain's root directory is missing or
//!   unreadable. The bulk scan fails fast and the status stays put.
//! - [`ResolveError`]: an on-demand lookup failed. Surfaced to the caller and
//!   never cached, so the next request retries.
//!
//! None of these are fatal to the process.

use std::path::PathBuf;

use crate::model::CacheDomain;

/// A single candidate could not be computed.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
  #[error("failed to read {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("{} not found", .path.display())]
  MissingFile { path: PathBuf },
  #[error("{} is malformed: {reason}", .path.display())]
  Malformed { path: PathBuf, reason: String },
  #[error("invalid XML in {}: {source}", .path.display())]
  Xml {
    path: PathBuf,
    #[source]
    source: roxmltree::Error,
  },
  #[error("invalid YAML in {}: {source}", .path.display())]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },
  #[error("computation panicked: {0}")]
  Panicked(String),
}

impl ItemError {
  /// Classify an I/O error, mapping `NotFound` to [`ItemError::MissingFile`].
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    let path = path.into();
    if source.kind() == std::io::ErrorKind::NotFound {
      Self::MissingFile { path }
    } else {
      Self::Io { path, source }
    }
  }

  pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::Malformed {
      path: path.into(),
      reason: reason.into(),
    }
  }
}

/// The configured root of a domain cannot be scanned at all.
#[derive(Debug, thiserror::Error)]
pub enum DomainRootError {
  #[error("{domain} root {} does not exist", .path.display())]
  Missing { domain: CacheDomain, path: PathBuf },
  #[error("{domain} root {} is not a directory", .path.display())]
  NotADirectory { domain: CacheDomain, path: PathBuf },
  #[error("{domain} root {} is not readable: {source}", .path.display())]
  Unreadable {
    domain: CacheDomain,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl DomainRootError {
  pub fn domain(&self) -> CacheDomain {
    match self {
      Self::Missing { domain, .. } | Self::NotADirectory { domain, .. } | Self::Unreadable { domain, .. } => *domain,
    }
  }
}

/// Error when the shared concurrency limiter refuses new work
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
  #[error("concurrency limiter is closed")]
  Closed,
}

/// An on-demand lookup failed.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
  #[error(transparent)]
  Root(#[from] DomainRootError),
  #[error("{domain} entry '{key}' not found")]
  NotFound { domain: CacheDomain, key: String },
  #[error("invalid {domain} key '{key}': {reason}")]
  InvalidKey {
    domain: CacheDomain,
    key: String,
    reason: String,
  },
  #[error("failed to compute {domain} entry '{key}': {source}")]
  Item {
    domain: CacheDomain,
    key: String,
    #[source]
    source: ItemError,
  },
  #[error(transparent)]
  Limiter(#[from] LimiterError),
}

impl ResolveError {
  pub fn not_found(domain: CacheDomain, key: impl Into<String>) -> Self {
    Self::NotFound { domain, key: key.into() }
  }

  pub fn invalid_key(domain: CacheDomain, key: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidKey {
      domain,
      key: key.into(),
      reason: reason.into(),
    }
  }
}

/// A manual rescan could not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RescanError {
  #[error("{0} cache is disabled")]
  Disabled(CacheDomain),
  #[error("{0} scan is already running")]
  AlreadyRunning(CacheDomain),
  #[error("cache orchestrator is shutting down")]
  ShuttingDown,
}

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("failed to render config: {0}")]
  Render(#[from] toml::ser::Error),
  #[error("invalid translation glob '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: globset::Error,
  },
}
