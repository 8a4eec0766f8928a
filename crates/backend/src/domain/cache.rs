//! Cache bookkeeping types: domains, per-domain status, entries and scan reports.

use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{project::ProjectInfo, scripture::ScriptureStats, translation::DraftInfo};

// ============================================================================
// Domains
// ============================================================================

/// One of the independently scanned data categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
  Scripture,
  Translation,
  Project,
}

impl CacheDomain {
  pub const ALL: [CacheDomain; 3] = [CacheDomain::Scripture, CacheDomain::Translation, CacheDomain::Project];

  pub fn as_str(&self) -> &'static str {
    match self {
      CacheDomain::Scripture => "scripture",
      CacheDomain::Translation => "translation",
      CacheDomain::Project => "project",
    }
  }

  /// Stable slot for per-domain arrays.
  pub fn index(self) -> usize {
    match self {
      CacheDomain::Scripture => 0,
      CacheDomain::Translation => 1,
      CacheDomain::Project => 2,
    }
  }

  /// Environment variable holding this domain's enable flag
  pub fn enable_var(self) -> &'static str {
    match self {
      CacheDomain::Scripture => "ENABLE_SCRIPTURE_CACHE",
      CacheDomain::Translation => "ENABLE_TRANSLATION_CACHE",
      CacheDomain::Project => "ENABLE_PROJECT_CACHE",
    }
  }
}

impl fmt::Display for CacheDomain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CacheDomain {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "scripture" | "scriptures" => Ok(CacheDomain::Scripture),
      "translation" | "translations" | "draft" | "drafts" => Ok(CacheDomain::Translation),
      "project" | "projects" => Ok(CacheDomain::Project),
      other => Err(format!("unknown cache domain: {other}")),
    }
  }
}

// ============================================================================
// Status
// ============================================================================

/// Population state of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
  /// The enable flag is off; reads are always computed and never cached
  Disabled,
  NotStarted,
  InProgress,
  /// Last scan finished with zero item failures
  Complete,
  /// Last scan finished but at least one item failed
  Degraded,
}

impl DomainStatus {
  /// Whether moving from `self` to `next` is a legal transition.
  ///
  /// `Disabled` is fixed at construction and never entered or left.
  pub fn can_transition_to(self, next: DomainStatus) -> bool {
    use DomainStatus::*;
    matches!(
      (self, next),
      (NotStarted, InProgress)
        | (InProgress, Complete)
        | (InProgress, Degraded)
        | (Complete, InProgress)
        | (Degraded, InProgress)
    )
  }

  /// A bulk scan has finished at least once.
  pub fn is_settled(self) -> bool {
    matches!(self, DomainStatus::Complete | DomainStatus::Degraded)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      DomainStatus::Disabled => "disabled",
      DomainStatus::NotStarted => "not_started",
      DomainStatus::InProgress => "in_progress",
      DomainStatus::Complete => "complete",
      DomainStatus::Degraded => "degraded",
    }
  }
}

impl fmt::Display for DomainStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ============================================================================
// Entries
// ============================================================================

/// Domain-specific statistics computed for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryStats {
  Scripture(ScriptureStats),
  Translation(DraftInfo),
  Project(ProjectInfo),
}

impl EntryStats {
  pub fn domain(&self) -> CacheDomain {
    match self {
      EntryStats::Scripture(_) => CacheDomain::Scripture,
      EntryStats::Translation(_) => CacheDomain::Translation,
      EntryStats::Project(_) => CacheDomain::Project,
    }
  }

  pub fn as_scripture(&self) -> Option<&ScriptureStats> {
    match self {
      EntryStats::Scripture(stats) => Some(stats),
      _ => None,
    }
  }

  pub fn as_translation(&self) -> Option<&DraftInfo> {
    match self {
      EntryStats::Translation(draft) => Some(draft),
      _ => None,
    }
  }

  pub fn as_project(&self) -> Option<&ProjectInfo> {
    match self {
      EntryStats::Project(project) => Some(project),
      _ => None,
    }
  }
}

/// Scanner output for one key before it is stamped into a [`CacheEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStats {
  pub stats: EntryStats,
  /// Set when the stats were produced but part of the computation failed
  pub partial_error: Option<String>,
}

impl ComputedStats {
  pub fn complete(stats: EntryStats) -> Self {
    Self {
      stats,
      partial_error: None,
    }
  }

  pub fn partial(stats: EntryStats, error: impl Into<String>) -> Self {
    Self {
      stats,
      partial_error: Some(error.into()),
    }
  }
}

/// Latest successful computation for a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
  pub key: String,
  pub stats: EntryStats,
  pub computed_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub partial_error: Option<String>,
}

impl CacheEntry {
  pub fn new(key: impl Into<String>, computed: ComputedStats) -> Self {
    Self {
      key: key.into(),
      stats: computed.stats,
      computed_at: Utc::now(),
      partial_error: computed.partial_error,
    }
  }

  pub fn domain(&self) -> CacheDomain {
    self.stats.domain()
  }

  /// Equal in everything except the computation timestamp.
  pub fn same_content(&self, other: &CacheEntry) -> bool {
    self.key == other.key && self.stats == other.stats && self.partial_error == other.partial_error
  }
}

// ============================================================================
// Scan reports
// ============================================================================

/// A key that failed during a scan and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
  pub key: String,
  pub cause: String,
}

/// Bookkeeping for one bulk scan of one domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
  pub domain: CacheDomain,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub duration_ms: Option<u64>,
  pub attempted: usize,
  pub succeeded: usize,
  pub failed: usize,
  pub failures: Vec<ItemFailure>,
  /// Set when the root directory could not be scanned at all
  pub root_error: Option<String>,
  /// Set when the scan was abandoned during shutdown
  pub cancelled: bool,
}

impl ScanReport {
  pub fn begin(domain: CacheDomain) -> Self {
    Self {
      domain,
      started_at: Utc::now(),
      finished_at: None,
      duration_ms: None,
      attempted: 0,
      succeeded: 0,
      failed: 0,
      failures: Vec::new(),
      root_error: None,
      cancelled: false,
    }
  }

  pub fn record_success(&mut self) {
    self.attempted += 1;
    self.succeeded += 1;
  }

  pub fn record_failure(&mut self, key: impl Into<String>, cause: impl Into<String>) {
    self.attempted += 1;
    self.failed += 1;
    self.failures.push(ItemFailure {
      key: key.into(),
      cause: cause.into(),
    });
  }

  /// Record entries that failed before they could be computed (e.g. during enumeration).
  pub fn record_failures(&mut self, failures: impl IntoIterator<Item = ItemFailure>) {
    for failure in failures {
      self.record_failure(failure.key, failure.cause);
    }
  }

  pub fn finish(&mut self, elapsed: Duration) {
    self.finished_at = Some(Utc::now());
    self.duration_ms = Some(elapsed.as_millis() as u64);
    self.failures.sort_by(|a, b| a.key.cmp(&b.key));
  }

  pub fn fail_root(&mut self, cause: impl Into<String>, elapsed: Duration) {
    self.root_error = Some(cause.into());
    self.finish(elapsed);
  }

  pub fn is_finished(&self) -> bool {
    self.finished_at.is_some()
  }

  pub fn failed_keys(&self) -> Vec<String> {
    self.failures.iter().map(|f| f.key.clone()).collect()
  }

  /// Status the domain should settle in, or `None` if the scan never ran to completion.
  pub fn outcome_status(&self) -> Option<DomainStatus> {
    if self.root_error.is_some() || self.cancelled || !self.is_finished() {
      return None;
    }
    if self.failed > 0 {
      Some(DomainStatus::Degraded)
    } else {
      Some(DomainStatus::Complete)
    }
  }
}
