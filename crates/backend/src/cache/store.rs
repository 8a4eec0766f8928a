//! In-memory cache tables, one per domain.
//!
//! Entries live in a [`DashMap`], so readers never wait on writers to other
//! keys. Status and the last scan report are published through `watch`
//! channels so callers can observe transitions without polling.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{CacheDomain, CacheEntry, DomainStatus, ScanReport};

#[derive(Debug)]
struct DomainTable {
  entries: DashMap<String, Arc<CacheEntry>>,
  status: watch::Sender<DomainStatus>,
  report: watch::Sender<Option<Arc<ScanReport>>>,
}

impl DomainTable {
  fn new(status: DomainStatus) -> Self {
    Self {
      entries: DashMap::new(),
      status: watch::channel(status).0,
      report: watch::channel(None).0,
    }
  }
}

/// Owner of every cached entry for the lifetime of the process.
#[derive(Debug)]
pub struct CacheStore {
  tables: [DomainTable; 3],
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new(&[])
  }
}

impl CacheStore {
  /// Create empty tables. `disabled` domains start and stay `Disabled`.
  pub fn new(disabled: &[CacheDomain]) -> Self {
    let table = |domain: CacheDomain| {
      DomainTable::new(if disabled.contains(&domain) {
        DomainStatus::Disabled
      } else {
        DomainStatus::NotStarted
      })
    };

    Self {
      tables: [
        table(CacheDomain::Scripture),
        table(CacheDomain::Translation),
        table(CacheDomain::Project),
      ],
    }
  }

  fn table(&self, domain: CacheDomain) -> &DomainTable {
    &self.tables[domain.index()]
  }

  // ==========================================================================
  // Entries
  // ==========================================================================

  pub fn get(&self, domain: CacheDomain, key: &str) -> Option<Arc<CacheEntry>> {
    self.table(domain).entries.get(key).map(|e| e.value().clone())
  }

  /// Insert or replace the entry for its key. Latest write wins.
  ///
  /// Returns `false` (and stores nothing) for a disabled domain.
  pub fn put(&self, domain: CacheDomain, entry: CacheEntry) -> bool {
    self.put_arc(domain, Arc::new(entry))
  }

  pub fn put_arc(&self, domain: CacheDomain, entry: Arc<CacheEntry>) -> bool {
    if self.status(domain) == DomainStatus::Disabled {
      debug!(domain = %domain, key = %entry.key, "Refusing to cache entry for disabled domain");
      return false;
    }
    self.table(domain).entries.insert(entry.key.clone(), entry);
    true
  }

  pub fn len(&self, domain: CacheDomain) -> usize {
    self.table(domain).entries.len()
  }

  pub fn is_empty(&self, domain: CacheDomain) -> bool {
    self.table(domain).entries.is_empty()
  }

  /// All entries of a domain, sorted by key.
  pub fn entries(&self, domain: CacheDomain) -> Vec<Arc<CacheEntry>> {
    let mut entries: Vec<_> = self.table(domain).entries.iter().map(|e| e.value().clone()).collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
  }

  pub fn keys(&self, domain: CacheDomain) -> Vec<String> {
    let mut keys: Vec<_> = self.table(domain).entries.iter().map(|e| e.key().clone()).collect();
    keys.sort();
    keys
  }

  /// Drop entries whose key was not seen by a scan and that were computed before it started.
  ///
  /// Entries written after `before` (for example by on-demand resolution
  /// during the scan) are kept. Returns the number removed.
  pub fn prune_stale(&self, domain: CacheDomain, seen: &HashSet<String>, before: DateTime<Utc>) -> usize {
    let entries = &self.table(domain).entries;
    let initial = entries.len();
    entries.retain(|key, entry| seen.contains(key) || entry.computed_at >= before);
    initial.saturating_sub(entries.len())
  }

  // ==========================================================================
  // Status
  // ==========================================================================

  pub fn status(&self, domain: CacheDomain) -> DomainStatus {
    *self.table(domain).status.borrow()
  }

  /// Move a domain to `next` if the transition is legal. Returns whether it changed.
  pub fn set_status(&self, domain: CacheDomain, next: DomainStatus) -> bool {
    let changed = self.table(domain).status.send_if_modified(|current| {
      if current.can_transition_to(next) {
        *current = next;
        true
      } else {
        false
      }
    });

    if changed {
      debug!(domain = %domain, status = %next, "Domain status changed");
    } else {
      debug!(domain = %domain, current = %self.status(domain), requested = %next, "Ignoring status transition");
    }
    changed
  }

  pub fn subscribe(&self, domain: CacheDomain) -> watch::Receiver<DomainStatus> {
    self.table(domain).status.subscribe()
  }

  // ==========================================================================
  // Reports
  // ==========================================================================

  pub fn record_report(&self, domain: CacheDomain, report: ScanReport) {
    self.table(domain).report.send_replace(Some(Arc::new(report)));
  }

  /// Report of the most recent finished scan, if any.
  pub fn snapshot_report(&self, domain: CacheDomain) -> Option<ScanReport> {
    self.table(domain).report.borrow().as_deref().cloned()
  }
}

#[cfg(test)]
mod tests {
  use std::{path::PathBuf, time::Duration};

  use pretty_assertions::assert_eq;

  use super::*;
  use crate::{
    model::{ComputedStats, EntryStats},
    project::{ProjectInfo, parse_settings},
  };

  fn project_entry(key: &str) -> CacheEntry {
    let settings = parse_settings("<S><Name>N</Name><LanguageIsoCode>en</LanguageIsoCode></S>").unwrap();
    let info = ProjectInfo::new(key, PathBuf::from(key), settings, DateTime::<Utc>::UNIX_EPOCH);
    CacheEntry::new(key, ComputedStats::complete(EntryStats::Project(info)))
  }

  #[test]
  fn test_put_replaces_and_sorts() {
    let store = CacheStore::default();
    assert!(store.put(CacheDomain::Project, project_entry("b")));
    assert!(store.put(CacheDomain::Project, project_entry("a")));
    assert!(store.put(CacheDomain::Project, project_entry("b")));

    assert_eq!(store.len(CacheDomain::Project), 2);
    assert_eq!(store.keys(CacheDomain::Project), vec!["a".to_string(), "b".to_string()]);
    assert!(store.get(CacheDomain::Project, "a").is_some());
    assert!(store.get(CacheDomain::Scripture, "a").is_none());
  }

  #[test]
  fn test_disabled_domain_stores_nothing() {
    let store = CacheStore::new(&[CacheDomain::Project]);
    assert_eq!(store.status(CacheDomain::Project), DomainStatus::Disabled);
    assert!(!store.put(CacheDomain::Project, project_entry("a")));
    assert!(store.is_empty(CacheDomain::Project));
    assert!(!store.set_status(CacheDomain::Project, DomainStatus::InProgress));
  }

  #[test]
  fn test_status_transitions_are_validated() {
    let store = CacheStore::default();
    let mut rx = store.subscribe(CacheDomain::Scripture);

    assert!(!store.set_status(CacheDomain::Scripture, DomainStatus::Complete));
    assert!(store.set_status(CacheDomain::Scripture, DomainStatus::InProgress));
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), DomainStatus::InProgress);

    assert!(store.set_status(CacheDomain::Scripture, DomainStatus::Degraded));
    assert!(store.set_status(CacheDomain::Scripture, DomainStatus::InProgress));
    assert!(!store.set_status(CacheDomain::Scripture, DomainStatus::NotStarted));
  }

  #[test]
  fn test_prune_stale_keeps_seen_and_recent() {
    let store = CacheStore::default();
    store.put(CacheDomain::Project, project_entry("kept"));
    store.put(CacheDomain::Project, project_entry("removed"));

    let scan_started = Utc::now() + chrono::Duration::milliseconds(1);
    std::thread::sleep(Duration::from_millis(5));
    store.put(CacheDomain::Project, project_entry("lazy"));

    let seen: HashSet<String> = ["kept".to_string()].into_iter().collect();
    assert_eq!(store.prune_stale(CacheDomain::Project, &seen, scan_started), 1);
    assert_eq!(
      store.keys(CacheDomain::Project),
      vec!["kept".to_string(), "lazy".to_string()]
    );
  }

  #[test]
  fn test_report_snapshot() {
    let store = CacheStore::default();
    assert!(store.snapshot_report(CacheDomain::Translation).is_none());

    let mut report = ScanReport::begin(CacheDomain::Translation);
    report.record_failure("x", "bad");
    report.finish(Duration::from_millis(3));
    store.record_report(CacheDomain::Translation, report);

    let snapshot = store.snapshot_report(CacheDomain::Translation).unwrap();
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.duration_ms, Some(3));
  }
}
