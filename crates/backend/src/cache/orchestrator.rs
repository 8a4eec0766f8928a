//! Startup scan coordination and the lazy read path.
//!
//! Each domain is fixed as [`DomainMode::Enabled`] or [`DomainMode::Disabled`]
//! when the orchestrator is built. Enabled domains are bulk-scanned at startup
//! (unless skipped) and on request; every domain can be read through
//! [`CacheOrchestrator::resolve`], which computes missing keys on demand under
//! the shared limiter instead of waiting for a scan.

use std::{
  collections::HashSet,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use super::{
  diagnostics::{DomainHealth, HealthReport, StartupTimer},
  store::CacheStore,
};
use crate::{
  config::Config,
  error::{ConfigError, DomainRootError, RescanError, ResolveError},
  model::{CacheDomain, CacheEntry, DomainStatus, ScanReport},
  scan::{
    ConcurrencyLimiter, DomainScanner, ScannerSet, check_scanner_root, compute_guarded, enumerate_candidates,
    locate_candidate, process_candidates,
  },
};

/// Whether a domain participates in caching.
#[derive(Debug, Clone)]
pub enum DomainMode {
  Enabled(Arc<dyn DomainScanner>),
  /// Never scanned; reads are computed every time and never cached
  Disabled(Arc<dyn DomainScanner>),
}

impl DomainMode {
  pub fn scanner(&self) -> &Arc<dyn DomainScanner> {
    match self {
      DomainMode::Enabled(scanner) | DomainMode::Disabled(scanner) => scanner,
    }
  }

  pub fn is_enabled(&self) -> bool {
    matches!(self, DomainMode::Enabled(_))
  }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
  /// Do not bulk-scan at startup
  pub skip_startup_scans: bool,
  pub max_concurrent: usize,
  pub disabled: Vec<CacheDomain>,
}

impl Default for OrchestratorSettings {
  fn default() -> Self {
    Self {
      skip_startup_scans: false,
      max_concurrent: crate::scan::DEFAULT_MAX_CONCURRENT,
      disabled: Vec::new(),
    }
  }
}

impl OrchestratorSettings {
  pub fn from_config(config: &Config) -> Self {
    Self {
      skip_startup_scans: config.cache.skip_heavy_operations_on_startup,
      max_concurrent: config.max_concurrent(),
      disabled: CacheDomain::ALL.into_iter().filter(|d| !config.is_enabled(*d)).collect(),
    }
  }
}

/// Where a resolved entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOrigin {
  /// Already in the cache
  Cache,
  /// Computed on demand and cached
  OnDemand,
  /// Computed on demand for a disabled domain; not cached
  Uncached,
}

#[derive(Debug, Clone)]
pub struct Resolution {
  pub entry: Arc<CacheEntry>,
  pub origin: ResolveOrigin,
}

#[derive(Debug)]
struct Inner {
  store: Arc<CacheStore>,
  limiter: ConcurrencyLimiter,
  modes: [DomainMode; 3],
  skip_startup_scans: bool,
  cancel: CancellationToken,
  /// One bulk scan per domain at a time
  scanning: [AtomicBool; 3],
  started: AtomicBool,
  tasks: TaskTracker,
  /// Serializes the close/wait/reopen cycle of `tasks`
  idle: Mutex<()>,
  startup: StartupTimer,
}

/// Coordinates scanners, the store and the limiter. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheOrchestrator {
  inner: Arc<Inner>,
}

/// Releases a domain's scan slot when the scan task ends.
struct ScanClaim {
  inner: Arc<Inner>,
  domain: CacheDomain,
  startup: bool,
}

impl Drop for ScanClaim {
  fn drop(&mut self) {
    self.inner.scanning[self.domain.index()].store(false, Ordering::SeqCst);
    if self.startup {
      self.inner.startup.domain_finished();
    }
  }
}

impl CacheOrchestrator {
  pub fn new(settings: OrchestratorSettings, scanners: ScannerSet, cancel: CancellationToken) -> Self {
    let mode = |domain: CacheDomain| {
      let scanner = scanners.get(domain).clone();
      if settings.disabled.contains(&domain) {
        DomainMode::Disabled(scanner)
      } else {
        DomainMode::Enabled(scanner)
      }
    };

    Self {
      inner: Arc::new(Inner {
        store: Arc::new(CacheStore::new(&settings.disabled)),
        limiter: ConcurrencyLimiter::new(settings.max_concurrent),
        modes: [
          mode(CacheDomain::Scripture),
          mode(CacheDomain::Translation),
          mode(CacheDomain::Project),
        ],
        skip_startup_scans: settings.skip_startup_scans,
        cancel,
        scanning: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
        started: AtomicBool::new(false),
        tasks: TaskTracker::new(),
        idle: Mutex::new(()),
        startup: StartupTimer::new(),
      }),
    }
  }

  pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, ConfigError> {
    let scanners = ScannerSet::from_config(config)?;
    Ok(Self::new(OrchestratorSettings::from_config(config), scanners, cancel))
  }

  pub fn store(&self) -> &Arc<CacheStore> {
    &self.inner.store
  }

  pub fn limiter(&self) -> &ConcurrencyLimiter {
    &self.inner.limiter
  }

  pub fn mode(&self, domain: CacheDomain) -> &DomainMode {
    &self.inner.modes[domain.index()]
  }

  pub fn status(&self, domain: CacheDomain) -> DomainStatus {
    self.inner.store.status(domain)
  }

  // ==========================================================================
  // Scanning
  // ==========================================================================

  /// Launch the startup scans. Returns the domains whose scan was launched.
  ///
  /// With the skip flag set nothing is launched and every read is resolved
  /// lazily. Only the first call has any effect.
  pub fn start(&self) -> Vec<CacheDomain> {
    if self.inner.started.swap(true, Ordering::SeqCst) {
      return Vec::new();
    }

    if self.inner.skip_startup_scans {
      info!("Skipping startup scans, caches will populate on first access");
      self.inner.startup.begin(0, true);
      return Vec::new();
    }

    let domains: Vec<CacheDomain> = CacheDomain::ALL
      .into_iter()
      .filter(|d| self.mode(*d).is_enabled())
      .collect();
    self.inner.startup.begin(domains.len(), false);
    info!(domains = ?domains, max_concurrent = self.inner.limiter.capacity(), "Starting cache scans");

    for domain in &domains {
      if self.claim(*domain) {
        self.spawn_scan(*domain, true);
      } else {
        // A manual rescan got there first
        self.inner.startup.domain_finished();
      }
    }
    domains
  }

  /// Trigger a bulk scan of one enabled domain.
  pub fn rescan(&self, domain: CacheDomain) -> Result<(), RescanError> {
    if self.inner.cancel.is_cancelled() {
      return Err(RescanError::ShuttingDown);
    }
    if !self.mode(domain).is_enabled() {
      return Err(RescanError::Disabled(domain));
    }
    if !self.claim(domain) {
      return Err(RescanError::AlreadyRunning(domain));
    }

    info!(domain = %domain, "Rescan requested");
    self.spawn_scan(domain, false);
    Ok(())
  }

  fn claim(&self, domain: CacheDomain) -> bool {
    self.inner.scanning[domain.index()]
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_ok()
  }

  fn spawn_scan(&self, domain: CacheDomain, startup: bool) {
    let claim = ScanClaim {
      inner: self.inner.clone(),
      domain,
      startup,
    };
    self.inner.tasks.spawn(run_scan(claim));
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  /// Look up a key, computing it on demand if it is not cached.
  ///
  /// Never waits for a bulk scan. Failures are returned to the caller and not
  /// cached, so the next call retries.
  pub async fn resolve(&self, domain: CacheDomain, key: &str) -> Result<Resolution, ResolveError> {
    match self.mode(domain) {
      DomainMode::Disabled(scanner) => {
        let entry = self.compute_single(scanner, key).await?;
        debug!(domain = %domain, key, "Resolved uncached entry");
        Ok(Resolution {
          entry: Arc::new(entry),
          origin: ResolveOrigin::Uncached,
        })
      }
      DomainMode::Enabled(scanner) => {
        if let Some(entry) = self.inner.store.get(domain, key) {
          return Ok(Resolution {
            entry,
            origin: ResolveOrigin::Cache,
          });
        }

        let entry = Arc::new(self.compute_single(scanner, key).await?);
        self.inner.store.put_arc(domain, entry.clone());
        debug!(domain = %domain, key, status = %self.status(domain), "Resolved entry on demand");
        Ok(Resolution {
          entry,
          origin: ResolveOrigin::OnDemand,
        })
      }
    }
  }

  async fn compute_single(&self, scanner: &Arc<dyn DomainScanner>, key: &str) -> Result<CacheEntry, ResolveError> {
    let domain = scanner.domain();
    let _permit = self.inner.limiter.acquire().await?;

    let candidate = locate_candidate(scanner.clone(), key.to_string()).await?;
    let computed = compute_guarded(scanner.as_ref(), &candidate)
      .await
      .map_err(|source| ResolveError::Item {
        domain,
        key: key.to_string(),
        source,
      })?;
    Ok(CacheEntry::new(candidate.key, computed))
  }

  /// Every entry of a domain, sorted by key.
  ///
  /// Enabled domains return what is cached. Disabled domains are enumerated
  /// and computed in full on every call; items that fail are left out.
  pub async fn entries(&self, domain: CacheDomain) -> Result<Vec<Arc<CacheEntry>>, DomainRootError> {
    let scanner = match self.mode(domain) {
      DomainMode::Enabled(_) => return Ok(self.inner.store.entries(domain)),
      DomainMode::Disabled(scanner) => scanner.clone(),
    };

    let enumeration = enumerate_candidates(scanner.clone()).await?;
    let mut report = ScanReport::begin(domain);
    let mut entries = Vec::with_capacity(enumeration.candidates.len());
    process_candidates(
      scanner,
      enumeration.candidates,
      &self.inner.limiter,
      &self.inner.cancel,
      &mut report,
      |key, computed| entries.push(Arc::new(CacheEntry::new(key, computed))),
    )
    .await;

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
  }

  // ==========================================================================
  // Introspection and lifecycle
  // ==========================================================================

  pub fn health(&self) -> HealthReport {
    HealthReport {
      domains: CacheDomain::ALL
        .into_iter()
        .map(|d| DomainHealth::from_store(&self.inner.store, d))
        .collect(),
      limiter: self.inner.limiter.stats(),
      startup: self.inner.startup.summary(),
      uptime_ms: self.inner.startup.uptime().as_millis() as u64,
    }
  }

  /// Wait until every scan launched so far has ended.
  pub async fn wait_idle(&self) {
    let _idle = self.inner.idle.lock().await;
    self.inner.tasks.close();
    self.inner.tasks.wait().await;
    self.inner.tasks.reopen();
  }

  /// Wait until every startup scan has ended. Returns immediately when scans were skipped.
  ///
  /// Never returns if [`start`](Self::start) is not called.
  pub async fn wait_startup_settled(&self) {
    self.inner.startup.wait_settled().await;
  }

  pub fn is_shutting_down(&self) -> bool {
    self.inner.cancel.is_cancelled()
  }

  /// Stop scanning: no new limiter slots are granted, units already holding
  /// one finish, then every scan task is awaited.
  pub async fn shutdown(&self) {
    info!("Shutting down cache orchestrator");
    self.inner.cancel.cancel();
    self.inner.limiter.close();
    self.wait_idle().await;
    info!(in_flight = self.inner.limiter.in_flight(), "Cache orchestrator stopped");
  }
}

/// One bulk scan of one domain.
async fn run_scan(claim: ScanClaim) {
  let inner = claim.inner.clone();
  let domain = claim.domain;
  let store = inner.store.clone();
  let scanner = inner.modes[domain.index()].scanner().clone();

  let start = Instant::now();
  let mut report = ScanReport::begin(domain);
  info!(domain = %domain, root = %scanner.root().display(), startup = claim.startup, "Scan started");

  // A root failure leaves the status untouched
  if let Err(e) = check_scanner_root(&scanner).await {
    warn!(domain = %domain, error = %e, "Scan aborted, domain root unusable");
    report.fail_root(e.to_string(), start.elapsed());
    store.record_report(domain, report);
    return;
  }

  // Enumeration is part of the scan and can dominate it
  store.set_status(domain, DomainStatus::InProgress);

  let enumeration = match enumerate_candidates(scanner.clone()).await {
    Ok(enumeration) => enumeration,
    Err(e) => {
      // Root vanished after the check; the scan ran and produced nothing
      warn!(domain = %domain, error = %e, "Scan aborted during enumeration");
      report.fail_root(e.to_string(), start.elapsed());
      store.record_report(domain, report);
      store.set_status(domain, DomainStatus::Degraded);
      return;
    }
  };

  let mut seen: HashSet<String> = enumeration.candidates.iter().map(|c| c.key.clone()).collect();
  seen.extend(enumeration.failures.iter().map(|f| f.key.clone()));
  report.record_failures(enumeration.failures);
  debug!(domain = %domain, candidates = enumeration.candidates.len(), "Enumerated candidates");

  process_candidates(
    scanner,
    enumeration.candidates,
    &inner.limiter,
    &inner.cancel,
    &mut report,
    |key, computed| {
      store.put(domain, CacheEntry::new(key, computed));
    },
  )
  .await;
  report.finish(start.elapsed());

  if report.cancelled {
    info!(
      domain = %domain,
      elapsed_ms = start.elapsed().as_millis() as u64,
      succeeded = report.succeeded,
      "Scan abandoned during shutdown"
    );
    store.record_report(domain, report);
    return;
  }

  let pruned = store.prune_stale(domain, &seen, report.started_at);
  let outcome = report.outcome_status();
  info!(
    domain = %domain,
    elapsed_ms = start.elapsed().as_millis() as u64,
    succeeded = report.succeeded,
    failed = report.failed,
    pruned,
    "Scan finished"
  );

  store.record_report(domain, report);
  if let Some(status) = outcome {
    store.set_status(domain, status);
  }
}
