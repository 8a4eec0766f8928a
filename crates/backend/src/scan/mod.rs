//! Domain scanners and the bounded per-candidate processing loop.
//!
//! Scanners are stateless workers. Each one knows how to enumerate the
//! candidates under its root (cheap, not limiter-gated), how to find a single
//! candidate by key, and how to compute the statistics for one candidate.
//! [`process_candidates`] drives the computation under the shared
//! [`ConcurrencyLimiter`].

mod limiter;
mod project;
mod scripture;
mod translation;

use std::{
  collections::HashMap,
  fmt,
  panic::AssertUnwindSafe,
  path::{Component, Path, PathBuf},
  sync::Arc,
  time::Instant,
};

use async_trait::async_trait;
use futures::FutureExt;
pub use limiter::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENT, LimiterPermit, LimiterStats};
pub use project::ProjectScanner;
pub use scripture::ScriptureScanner;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
pub use translation::TranslationScanner;

use crate::{
  config::Config,
  error::{ConfigError, DomainRootError, ItemError, ResolveError},
  model::{CacheDomain, ComputedStats, ItemFailure, ScanReport},
};

/// One unit of work found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
  pub key: String,
  pub path: PathBuf,
}

impl Candidate {
  pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      key: key.into(),
      path: path.into(),
    }
  }
}

/// Enumeration result: candidates to compute plus entries that could not even be inspected.
#[derive(Debug, Default)]
pub struct Enumeration {
  pub candidates: Vec<Candidate>,
  pub failures: Vec<ItemFailure>,
}

impl Enumeration {
  pub(crate) fn fail(&mut self, key: impl Into<String>, cause: impl fmt::Display) {
    self.failures.push(ItemFailure {
      key: key.into(),
      cause: cause.to_string(),
    });
  }

  pub(crate) fn finish(mut self) -> Self {
    self.candidates.sort_by(|a, b| a.key.cmp(&b.key));
    self.candidates.dedup_by(|a, b| a.key == b.key);
    self
  }
}

/// Enumerates and computes entries for one domain.
///
/// `enumerate` and `locate` do blocking filesystem work and must run on a
/// blocking thread.
#[async_trait]
pub trait DomainScanner: Send + Sync + fmt::Debug {
  fn domain(&self) -> CacheDomain;

  fn root(&self) -> &Path;

  /// List candidates under the root. Fails only when the root itself is unusable.
  fn enumerate(&self) -> Result<Enumeration, DomainRootError>;

  /// Find the candidate for a single key.
  fn locate(&self, key: &str) -> Result<Candidate, ResolveError>;

  /// Compute statistics for one candidate.
  async fn compute(&self, candidate: &Candidate) -> Result<ComputedStats, ItemError>;
}

// ============================================================================
// Scanner set
// ============================================================================

/// The three scanners, one per domain.
#[derive(Debug, Clone)]
pub struct ScannerSet {
  pub scripture: Arc<dyn DomainScanner>,
  pub translation: Arc<dyn DomainScanner>,
  pub project: Arc<dyn DomainScanner>,
}

impl ScannerSet {
  pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
    Ok(Self {
      scripture: Arc::new(ScriptureScanner::from_config(config)),
      translation: Arc::new(TranslationScanner::from_config(config)?),
      project: Arc::new(ProjectScanner::from_config(config)),
    })
  }

  pub fn get(&self, domain: CacheDomain) -> &Arc<dyn DomainScanner> {
    match domain {
      CacheDomain::Scripture => &self.scripture,
      CacheDomain::Translation => &self.translation,
      CacheDomain::Project => &self.project,
    }
  }
}

// ============================================================================
// Shared checks
// ============================================================================

/// Ensure a domain root exists, is a directory, and can be listed.
pub(crate) fn check_root(domain: CacheDomain, root: &Path) -> Result<(), DomainRootError> {
  let metadata = std::fs::metadata(root).map_err(|source| {
    if source.kind() == std::io::ErrorKind::NotFound {
      DomainRootError::Missing {
        domain,
        path: root.to_path_buf(),
      }
    } else {
      DomainRootError::Unreadable {
        domain,
        path: root.to_path_buf(),
        source,
      }
    }
  })?;

  if !metadata.is_dir() {
    return Err(DomainRootError::NotADirectory {
      domain,
      path: root.to_path_buf(),
    });
  }

  std::fs::read_dir(root).map_err(|source| DomainRootError::Unreadable {
    domain,
    path: root.to_path_buf(),
    source,
  })?;
  Ok(())
}

/// Reject keys that could escape the domain root.
///
/// Flat domains accept a single path component; nested domains accept a
/// relative path of normal components.
pub(crate) fn validate_key(domain: CacheDomain, key: &str, nested: bool) -> Result<(), ResolveError> {
  if key.is_empty() {
    return Err(ResolveError::invalid_key(domain, key, "key is empty"));
  }

  let mut count = 0;
  for component in Path::new(key).components() {
    match component {
      Component::Normal(_) => count += 1,
      _ => {
        return Err(ResolveError::invalid_key(domain, key, "key must be a plain relative path"));
      }
    }
  }

  if !nested && count != 1 {
    return Err(ResolveError::invalid_key(domain, key, "key must be a single name"));
  }
  Ok(())
}

/// Render a relative path as a `/`-separated key.
pub(crate) fn relative_key(relative: &Path) -> String {
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

// ============================================================================
// Processing
// ============================================================================

/// Run [`check_root`] for a scanner's root on a blocking thread.
pub(crate) async fn check_scanner_root(scanner: &Arc<dyn DomainScanner>) -> Result<(), DomainRootError> {
  let domain = scanner.domain();
  let root = scanner.root().to_path_buf();
  let checked = root.clone();

  match tokio::task::spawn_blocking(move || check_root(domain, &checked)).await {
    Ok(result) => result,
    Err(e) => Err(DomainRootError::Unreadable {
      domain,
      path: root,
      source: std::io::Error::other(format!("root check task failed: {e}")),
    }),
  }
}

/// Run `enumerate` on a blocking thread.
pub(crate) async fn enumerate_candidates(scanner: Arc<dyn DomainScanner>) -> Result<Enumeration, DomainRootError> {
  let domain = scanner.domain();
  let root = scanner.root().to_path_buf();

  match tokio::task::spawn_blocking(move || scanner.enumerate()).await {
    Ok(result) => result,
    Err(e) => Err(DomainRootError::Unreadable {
      domain,
      path: root,
      source: std::io::Error::other(format!("enumeration task failed: {e}")),
    }),
  }
}

/// Run `locate` on a blocking thread.
pub(crate) async fn locate_candidate(scanner: Arc<dyn DomainScanner>, key: String) -> Result<Candidate, ResolveError> {
  let domain = scanner.domain();
  let lookup = key.clone();

  match tokio::task::spawn_blocking(move || scanner.locate(&lookup)).await {
    Ok(result) => result,
    Err(e) => Err(ResolveError::Item {
      domain,
      key,
      source: ItemError::Panicked(e.to_string()),
    }),
  }
}

/// Compute one candidate, turning a panic into an [`ItemError`].
pub(crate) async fn compute_guarded(scanner: &dyn DomainScanner, candidate: &Candidate) -> Result<ComputedStats, ItemError> {
  match AssertUnwindSafe(scanner.compute(candidate)).catch_unwind().await {
    Ok(result) => result,
    Err(panic) => {
      let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
      Err(ItemError::Panicked(message))
    }
  }
}

/// Compute every candidate concurrently, one limiter slot per candidate.
///
/// Each success is handed to `sink` as soon as it finishes; failures are
/// recorded in `report`. On cancellation (or a closed limiter) no new slots are
/// acquired, units already holding a slot run to completion, and the report is
/// marked cancelled.
pub(crate) async fn process_candidates<F>(
  scanner: Arc<dyn DomainScanner>,
  candidates: Vec<Candidate>,
  limiter: &ConcurrencyLimiter,
  cancel: &CancellationToken,
  report: &mut ScanReport,
  mut sink: F,
) where
  F: FnMut(String, ComputedStats),
{
  let domain = scanner.domain();
  let mut tasks: JoinSet<UnitResult> = JoinSet::new();
  // Keys by task, so a task that dies still has its failure recorded
  let mut keys: HashMap<task::Id, String> = HashMap::new();

  for candidate in candidates {
    let permit = tokio::select! {
      biased;

      _ = cancel.cancelled() => {
        report.cancelled = true;
        break;
      }

      permit = limiter.acquire() => match permit {
        Ok(permit) => permit,
        Err(_) => {
          report.cancelled = true;
          break;
        }
      },
    };

    let scanner = scanner.clone();
    let key = candidate.key.clone();
    let abort = tasks.spawn(async move {
      let _permit = permit;
      let start = Instant::now();
      let outcome = compute_guarded(scanner.as_ref(), &candidate).await;
      (outcome, start.elapsed().as_millis())
    });
    keys.insert(abort.id(), key);

    while let Some(joined) = tasks.try_join_next_with_id() {
      record_unit(domain, joined, &mut keys, report, &mut sink);
    }
  }

  while let Some(joined) = tasks.join_next_with_id().await {
    record_unit(domain, joined, &mut keys, report, &mut sink);
  }
}

type UnitResult = (Result<ComputedStats, ItemError>, u128);

/// Book one finished unit. A task that died counts as a failure of its key.
fn record_unit<F>(
  domain: CacheDomain,
  joined: Result<(task::Id, UnitResult), task::JoinError>,
  keys: &mut HashMap<task::Id, String>,
  report: &mut ScanReport,
  sink: &mut F,
) where
  F: FnMut(String, ComputedStats),
{
  match joined {
    Ok((id, (outcome, elapsed_ms))) => {
      let key = keys.remove(&id).unwrap_or_default();
      match outcome {
        Ok(stats) => {
          debug!(domain = %domain, key = %key, elapsed_ms, "Computed entry");
          report.record_success();
          sink(key, stats);
        }
        Err(e) => {
          warn!(domain = %domain, key = %key, elapsed_ms, error = %e, "Failed to compute entry");
          report.record_failure(key, e.to_string());
        }
      }
    }
    Err(e) => {
      let key = keys.remove(&e.id()).unwrap_or_default();
      warn!(domain = %domain, key = %key, error = %e, "Scan task did not complete");
      report.record_failure(key, format!("scan task did not complete: {e}"));
    }
  }
}
