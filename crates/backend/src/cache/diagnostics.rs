//! Health and startup diagnostics.
//!
//! [`HealthReport`] is read off the live store and limiter. [`run_diagnostics`]
//! is the standalone bottleneck check: it checks each domain root and times
//! every scanner on its own, one domain after another.

use std::{
  path::{Path, PathBuf},
  sync::{
    OnceLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;
use walkdir::WalkDir;

use super::store::CacheStore;
use crate::{
  model::{CacheDomain, DomainStatus, ScanReport},
  scan::{ConcurrencyLimiter, LimiterStats, ScannerSet, enumerate_candidates, process_candidates},
};

/// Order in which the standalone diagnostic runs the scanners
const DIAGNOSTIC_ORDER: [CacheDomain; 3] = [CacheDomain::Project, CacheDomain::Translation, CacheDomain::Scripture];

const SLOW_SCRIPTURE: Duration = Duration::from_secs(10);
const SLOW_TRANSLATION: Duration = Duration::from_secs(5);
const SLOW_TOTAL: Duration = Duration::from_secs(30);

// ============================================================================
// Startup timing
// ============================================================================

/// Tracks wall-clock time from process start until every startup scan has ended.
#[derive(Debug)]
pub(crate) struct StartupTimer {
  started: Instant,
  pending: AtomicUsize,
  skipped: AtomicBool,
  settled_after: OnceLock<Duration>,
  settled: watch::Sender<bool>,
}

impl StartupTimer {
  pub(crate) fn new() -> Self {
    Self {
      started: Instant::now(),
      pending: AtomicUsize::new(0),
      skipped: AtomicBool::new(false),
      settled_after: OnceLock::new(),
      settled: watch::channel(false).0,
    }
  }

  /// Register the startup scans about to launch.
  pub(crate) fn begin(&self, pending: usize, skipped: bool) {
    self.skipped.store(skipped, Ordering::SeqCst);
    self.pending.store(pending, Ordering::SeqCst);
    if pending == 0 {
      self.settle();
    }
  }

  /// One startup scan ended, successfully or not.
  pub(crate) fn domain_finished(&self) {
    let previous = self
      .pending
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    if previous == Ok(1) {
      self.settle();
    }
  }

  fn settle(&self) {
    let elapsed = self.started.elapsed();
    if self.settled_after.set(elapsed).is_ok() {
      info!(elapsed_ms = elapsed.as_millis() as u64, "Startup scans settled");
    }
    self.settled.send_replace(true);
  }

  pub(crate) async fn wait_settled(&self) {
    let mut rx = self.settled.subscribe();
    let _ = rx.wait_for(|settled| *settled).await;
  }

  pub(crate) fn uptime(&self) -> Duration {
    self.started.elapsed()
  }

  pub(crate) fn summary(&self) -> StartupSummary {
    StartupSummary {
      skipped: self.skipped.load(Ordering::SeqCst),
      pending_domains: self.pending.load(Ordering::SeqCst),
      settled_after_ms: self.settled_after.get().map(|d| d.as_millis() as u64),
    }
  }
}

/// Startup progress as seen by the health surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupSummary {
  /// Bulk scans were skipped; every read is resolved lazily
  pub skipped: bool,
  pub pending_domains: usize,
  /// Time from process start until all startup scans ended
  pub settled_after_ms: Option<u64>,
}

// ============================================================================
// Health
// ============================================================================

/// Status and last-scan figures for one domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainHealth {
  pub domain: CacheDomain,
  pub status: DomainStatus,
  /// `None` when no scan has run
  pub last_scan_duration_ms: Option<u64>,
  pub item_count: usize,
  pub failure_count: usize,
  pub failed_keys: Vec<String>,
  pub last_scan_at: Option<DateTime<Utc>>,
  pub root_error: Option<String>,
}

impl DomainHealth {
  pub(crate) fn from_store(store: &CacheStore, domain: CacheDomain) -> Self {
    let report = store.snapshot_report(domain);
    Self {
      domain,
      status: store.status(domain),
      last_scan_duration_ms: report.as_ref().and_then(|r| r.duration_ms),
      item_count: store.len(domain),
      failure_count: report.as_ref().map(|r| r.failed).unwrap_or(0),
      failed_keys: report.as_ref().map(ScanReport::failed_keys).unwrap_or_default(),
      last_scan_at: report.as_ref().and_then(|r| r.finished_at),
      root_error: report.and_then(|r| r.root_error),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
  pub domains: Vec<DomainHealth>,
  pub limiter: LimiterStats,
  pub startup: StartupSummary,
  pub uptime_ms: u64,
}

impl HealthReport {
  pub fn domain(&self, domain: CacheDomain) -> Option<&DomainHealth> {
    self.domains.iter().find(|d| d.domain == domain)
  }
}

// ============================================================================
// Standalone diagnostics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirectoryState {
  Ok { file_count: usize },
  Missing,
  NotADirectory,
  Unreadable { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryCheck {
  pub domain: CacheDomain,
  pub path: PathBuf,
  pub state: DirectoryState,
}

impl DirectoryCheck {
  /// Inspect a root and count the files beneath it. Blocking.
  pub fn inspect(domain: CacheDomain, path: &Path) -> Self {
    let state = match std::fs::metadata(path) {
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => DirectoryState::Missing,
      Err(e) => DirectoryState::Unreadable { error: e.to_string() },
      Ok(metadata) if !metadata.is_dir() => DirectoryState::NotADirectory,
      Ok(_) => match std::fs::read_dir(path) {
        Err(e) => DirectoryState::Unreadable { error: e.to_string() },
        Ok(_) => DirectoryState::Ok {
          file_count: WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count(),
        },
      },
    };

    Self {
      domain,
      path: path.to_path_buf(),
      state,
    }
  }

  pub fn is_usable(&self) -> bool {
    matches!(self.state, DirectoryState::Ok { .. })
  }
}

/// How long one scanner took in isolation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTiming {
  pub domain: CacheDomain,
  pub duration_ms: u64,
  /// Fraction of the total diagnostic run
  pub share: f64,
  pub item_count: usize,
  pub failure_count: usize,
  pub root_error: Option<String>,
}

/// Operator advice for a slow domain or a slow start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
  pub subject: String,
  pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
  pub directories: Vec<DirectoryCheck>,
  pub timings: Vec<DomainTiming>,
  pub reports: Vec<ScanReport>,
  pub total_ms: u64,
  pub recommendations: Vec<Recommendation>,
}

/// Check every root, then time each scanner sequentially. Nothing is cached.
pub async fn run_diagnostics(scanners: &ScannerSet, limiter: &ConcurrencyLimiter) -> DiagnosticReport {
  let mut directories = Vec::with_capacity(DIAGNOSTIC_ORDER.len());
  for domain in DIAGNOSTIC_ORDER {
    let root = scanners.get(domain).root().to_path_buf();
    let check = tokio::task::spawn_blocking(move || DirectoryCheck::inspect(domain, &root)).await;
    match check {
      Ok(check) => directories.push(check),
      Err(e) => directories.push(DirectoryCheck {
        domain,
        path: scanners.get(domain).root().to_path_buf(),
        state: DirectoryState::Unreadable { error: e.to_string() },
      }),
    }
  }

  let cancel = CancellationToken::new();
  let total_start = Instant::now();
  let mut measured = Vec::with_capacity(DIAGNOSTIC_ORDER.len());

  for domain in DIAGNOSTIC_ORDER {
    info!(domain = %domain, "Timing scanner");
    let scanner = scanners.get(domain).clone();
    let start = Instant::now();
    let mut report = ScanReport::begin(domain);
    let mut computed = 0usize;

    match enumerate_candidates(scanner.clone()).await {
      Err(e) => report.fail_root(e.to_string(), start.elapsed()),
      Ok(enumeration) => {
        report.record_failures(enumeration.failures);
        process_candidates(scanner, enumeration.candidates, limiter, &cancel, &mut report, |_, _| {
          computed += 1;
        })
        .await;
        report.finish(start.elapsed());
      }
    }

    info!(
      domain = %domain,
      elapsed_ms = start.elapsed().as_millis() as u64,
      items = computed,
      failures = report.failed,
      "Scanner timed"
    );
    measured.push((start.elapsed(), computed, report));
  }

  let total = total_start.elapsed();
  let timings: Vec<DomainTiming> = measured
    .iter()
    .map(|(elapsed, computed, report)| DomainTiming {
      domain: report.domain,
      duration_ms: elapsed.as_millis() as u64,
      share: share_of(*elapsed, total),
      item_count: *computed,
      failure_count: report.failed,
      root_error: report.root_error.clone(),
    })
    .collect();

  let durations: Vec<(CacheDomain, Duration)> = measured.iter().map(|(d, _, r)| (r.domain, *d)).collect();

  DiagnosticReport {
    directories,
    timings,
    reports: measured.into_iter().map(|(_, _, r)| r).collect(),
    total_ms: total.as_millis() as u64,
    recommendations: recommendations(&durations, total),
  }
}

fn share_of(part: Duration, total: Duration) -> f64 {
  if total.is_zero() {
    0.0
  } else {
    part.as_secs_f64() / total.as_secs_f64()
  }
}

/// Advice for domains and totals over the slow thresholds.
pub(crate) fn recommendations(durations: &[(CacheDomain, Duration)], total: Duration) -> Vec<Recommendation> {
  let took = |domain: CacheDomain| {
    durations
      .iter()
      .find(|(d, _)| *d == domain)
      .map(|(_, elapsed)| *elapsed)
      .unwrap_or_default()
  };

  let mut advice = Vec::new();
  if took(CacheDomain::Scripture) > SLOW_SCRIPTURE {
    advice.push(Recommendation {
      subject: "Scripture scanning is slow".to_string(),
      actions: vec![
        "Set ENABLE_SCRIPTURE_CACHE=false if you don't need scripture stats".to_string(),
        "Reduce MAX_CONCURRENT_FILE_PROCESSING".to_string(),
        "Set SKIP_HEAVY_OPERATIONS_ON_STARTUP=true".to_string(),
      ],
    });
  }
  if took(CacheDomain::Translation) > SLOW_TRANSLATION {
    advice.push(Recommendation {
      subject: "Translation scanning is slow".to_string(),
      actions: vec![
        "Set ENABLE_TRANSLATION_CACHE=false if you don't need translations".to_string(),
        "Check whether MT/experiments has too many nested directories".to_string(),
      ],
    });
  }
  if total > SLOW_TOTAL {
    advice.push(Recommendation {
      subject: "Overall startup is very slow".to_string(),
      actions: vec!["Set SKIP_HEAVY_OPERATIONS_ON_STARTUP=true for development".to_string()],
    });
  }
  advice
}
