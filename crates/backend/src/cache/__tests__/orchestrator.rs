//! Orchestrator behaviour: startup scans, lazy resolution, disabled domains,
//! failure isolation and shutdown.

use std::time::Duration;

use pretty_assertions::assert_eq;

use super::helpers::{CountingScanner, Counted, DataTree, VREF, orchestrator, wait_for_status};
use crate::{
  cache::{OrchestratorSettings, ResolveOrigin},
  error::{LimiterError, RescanError, ResolveError},
  model::{CacheDomain, DomainStatus},
  scan::ScannerSet,
};

fn settings() -> OrchestratorSettings {
  OrchestratorSettings::default()
}

#[tokio::test]
async fn test_startup_scan_populates_every_domain() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());

  assert_eq!(orch.start().len(), 3);
  orch.wait_startup_settled().await;

  for domain in CacheDomain::ALL {
    assert_eq!(orch.status(domain), DomainStatus::Complete, "{domain}");
    assert_eq!(orch.store().len(domain), 2, "{domain}");
  }

  let health = orch.health();
  assert!(!health.startup.skipped);
  assert_eq!(health.startup.pending_domains, 0);
  assert!(health.startup.settled_after_ms.is_some());
}

#[tokio::test]
async fn test_resolve_returns_what_the_scanner_computed() {
  let tree = DataTree::populated();
  let scanners = tree.scanners();
  let orch = orchestrator(settings(), scanners.clone());
  orch.start();
  orch.wait_startup_settled().await;

  for entry in orch.store().entries(CacheDomain::Translation) {
    let scanner = scanners.get(CacheDomain::Translation);
    let direct = scanner.compute(&scanner.locate(&entry.key).unwrap()).await.unwrap();

    let resolved = orch.resolve(CacheDomain::Translation, &entry.key).await.unwrap();
    assert_eq!(resolved.origin, ResolveOrigin::Cache);
    assert_eq!(resolved.entry.stats, direct.stats);
  }
}

#[tokio::test]
async fn test_start_is_idempotent() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::ZERO);
  let orch = orchestrator(settings(), counted.set());

  orch.start();
  assert!(orch.start().is_empty());
  orch.wait_startup_settled().await;
  orch.wait_idle().await;

  assert_eq!(counted.project.enumerations(), 1);
}

#[tokio::test]
async fn test_malformed_project_degrades_domain_only() {
  let tree = DataTree::populated();
  tree.write_settings("Broken", "<ScriptureText><Name>Broken");
  let orch = orchestrator(settings(), tree.scanners());

  orch.start();
  orch.wait_startup_settled().await;

  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::Degraded);
  assert_eq!(orch.status(CacheDomain::Scripture), DomainStatus::Complete);
  assert_eq!(orch.store().keys(CacheDomain::Project), vec!["ABC".to_string(), "DEF".to_string()]);

  let report = orch.store().snapshot_report(CacheDomain::Project).unwrap();
  assert_eq!(report.attempted, 3);
  assert_eq!(report.succeeded, 2);
  assert_eq!(report.failed_keys(), vec!["Broken".to_string()]);
  assert!(report.failures[0].cause.contains("invalid XML"));

  let health = orch.health();
  let project = health.domain(CacheDomain::Project).unwrap();
  assert_eq!(project.failure_count, 1);
  assert_eq!(project.item_count, 2);
}

#[tokio::test]
async fn test_missing_translation_root_fails_fast() {
  let tree = DataTree::populated();
  std::fs::remove_dir_all(tree.domain_root(CacheDomain::Translation)).unwrap();
  let orch = orchestrator(settings(), tree.scanners());

  orch.start();
  tokio::time::timeout(Duration::from_secs(5), orch.wait_startup_settled())
    .await
    .expect("startup should settle");

  assert_eq!(orch.status(CacheDomain::Translation), DomainStatus::NotStarted);
  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::Complete);

  let report = orch.store().snapshot_report(CacheDomain::Translation).unwrap();
  assert!(report.root_error.as_deref().unwrap().contains("does not exist"));

  let result = tokio::time::timeout(
    Duration::from_secs(5),
    orch.resolve(CacheDomain::Translation, "Team/exp1/infer/1000/en-KJV/41MAT.SFM"),
  )
  .await
  .expect("resolve should not hang");
  assert!(matches!(result, Err(ResolveError::Root(_))));
}

#[tokio::test]
async fn test_skip_flag_launches_no_scans() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::ZERO);
  let orch = orchestrator(
    OrchestratorSettings {
      skip_startup_scans: true,
      ..settings()
    },
    counted.set(),
  );

  assert!(orch.start().is_empty());
  orch.wait_startup_settled().await;
  orch.wait_idle().await;

  for domain in CacheDomain::ALL {
    assert_eq!(counted.get(domain).enumerations(), 0);
    assert_eq!(orch.status(domain), DomainStatus::NotStarted);
    assert!(orch.store().is_empty(domain));
  }
  assert!(orch.health().startup.skipped);

  let first = orch.resolve(CacheDomain::Project, "ABC").await.unwrap();
  assert_eq!(first.origin, ResolveOrigin::OnDemand);
  let second = orch.resolve(CacheDomain::Project, "ABC").await.unwrap();
  assert_eq!(second.origin, ResolveOrigin::Cache);

  assert_eq!(counted.project.computations(), 1);
  assert_eq!(counted.project.enumerations(), 0);
  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::NotStarted);
}

#[tokio::test]
async fn test_disabled_domain_recomputes_every_read() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::ZERO);
  let orch = orchestrator(
    OrchestratorSettings {
      disabled: vec![CacheDomain::Scripture],
      ..settings()
    },
    counted.set(),
  );

  assert_eq!(orch.start(), vec![CacheDomain::Translation, CacheDomain::Project]);
  orch.wait_startup_settled().await;

  assert_eq!(orch.status(CacheDomain::Scripture), DomainStatus::Disabled);
  assert_eq!(counted.scripture.enumerations(), 0);

  for _ in 0..2 {
    let resolved = orch.resolve(CacheDomain::Scripture, "en-KJV").await.unwrap();
    assert_eq!(resolved.origin, ResolveOrigin::Uncached);
  }
  assert_eq!(counted.scripture.computations(), 2);
  assert!(orch.store().is_empty(CacheDomain::Scripture));
  assert_eq!(orch.rescan(CacheDomain::Scripture), Err(RescanError::Disabled(CacheDomain::Scripture)));

  let listed = orch.entries(CacheDomain::Scripture).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(orch.store().is_empty(CacheDomain::Scripture));
}

#[tokio::test]
async fn test_miss_after_scan_is_computed_and_cached() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());
  orch.start();
  orch.wait_startup_settled().await;

  let err = orch.resolve(CacheDomain::Scripture, "fr-LSG").await.unwrap_err();
  assert!(matches!(err, ResolveError::NotFound { .. }));

  // The failure was not cached, so a file added later resolves
  tree.add_scripture("fr-LSG", "Au commencement\n\n\n");
  let resolved = orch.resolve(CacheDomain::Scripture, "fr-LSG").await.unwrap();
  assert_eq!(resolved.origin, ResolveOrigin::OnDemand);
  assert!(orch.store().get(CacheDomain::Scripture, "fr-LSG").is_some());
  assert_eq!(orch.status(CacheDomain::Scripture), DomainStatus::Complete);
}

#[tokio::test]
async fn test_resolve_rejects_keys_outside_the_root() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());

  let err = orch.resolve(CacheDomain::Project, "../MT").await.unwrap_err();
  assert!(matches!(err, ResolveError::InvalidKey { .. }));
}

#[tokio::test]
async fn test_item_failure_on_demand_is_not_cached() {
  let tree = DataTree::populated();
  tree.write_settings("Broken", "<ScriptureText>");
  let orch = orchestrator(settings(), tree.scanners());

  let err = orch.resolve(CacheDomain::Project, "Broken").await.unwrap_err();
  assert!(matches!(err, ResolveError::Item { .. }));
  assert!(orch.store().get(CacheDomain::Project, "Broken").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolve_does_not_wait_for_bulk_scan() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::from_millis(400));
  let orch = orchestrator(settings(), counted.set());

  orch.start();
  wait_for_status(&orch, CacheDomain::Project, |s| s == DomainStatus::InProgress).await;

  let resolved = orch.resolve(CacheDomain::Project, "DEF").await.unwrap();
  assert_eq!(resolved.origin, ResolveOrigin::OnDemand);

  orch.wait_startup_settled().await;
  let report = orch.store().snapshot_report(CacheDomain::Project).unwrap();
  assert_eq!(report.succeeded, 2, "bulk scan bookkeeping is independent of lazy reads");
  assert_eq!(counted.project.computations(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_rescan_is_rejected() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::from_millis(200));
  let orch = orchestrator(settings(), counted.set());

  orch.rescan(CacheDomain::Project).unwrap();
  assert_eq!(
    orch.rescan(CacheDomain::Project),
    Err(RescanError::AlreadyRunning(CacheDomain::Project))
  );

  orch.wait_idle().await;
  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::Complete);
  orch.rescan(CacheDomain::Project).unwrap();
  orch.wait_idle().await;
  assert_eq!(counted.project.enumerations(), 2);
}

#[tokio::test]
async fn test_rescan_over_unchanged_tree_is_idempotent() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());
  orch.start();
  orch.wait_startup_settled().await;

  let before: Vec<_> = CacheDomain::ALL.iter().flat_map(|d| orch.store().entries(*d)).collect();

  for domain in CacheDomain::ALL {
    orch.rescan(domain).unwrap();
  }
  orch.wait_idle().await;

  let after: Vec<_> = CacheDomain::ALL.iter().flat_map(|d| orch.store().entries(*d)).collect();
  assert_eq!(before.len(), after.len());
  for (old, new) in before.iter().zip(&after) {
    assert!(old.same_content(new), "{} changed", old.key);
    assert!(new.computed_at >= old.computed_at);
  }
}

#[tokio::test]
async fn test_failed_recompute_keeps_previous_entry() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());
  orch.start();
  orch.wait_startup_settled().await;
  let good = orch.store().get(CacheDomain::Project, "ABC").unwrap();

  tree.write_settings("ABC", "<ScriptureText><Name>");
  orch.rescan(CacheDomain::Project).unwrap();
  orch.wait_idle().await;

  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::Degraded);
  let kept = orch.store().get(CacheDomain::Project, "ABC").unwrap();
  assert!(kept.same_content(&good));
  assert_eq!(kept.computed_at, good.computed_at);
}

#[tokio::test]
async fn test_rescan_prunes_removed_items() {
  let tree = DataTree::populated();
  let orch = orchestrator(settings(), tree.scanners());
  orch.start();
  orch.wait_startup_settled().await;

  std::fs::remove_file(tree.domain_root(CacheDomain::Scripture).join("de-LU.txt")).unwrap();
  orch.rescan(CacheDomain::Scripture).unwrap();
  orch.wait_idle().await;

  assert_eq!(orch.store().keys(CacheDomain::Scripture), vec!["en-KJV".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_abandons_scans_and_rejects_new_work() {
  let tree = DataTree::populated();
  for i in 0..8 {
    tree.add_project(&format!("P{i}"), "en");
  }
  let counted = Counted::wrap(tree.scanners(), Duration::from_millis(100));
  let orch = orchestrator(
    OrchestratorSettings {
      max_concurrent: 1,
      ..settings()
    },
    counted.set(),
  );

  orch.start();
  wait_for_status(&orch, CacheDomain::Project, |s| s == DomainStatus::InProgress).await;
  tokio::time::timeout(Duration::from_secs(5), orch.shutdown())
    .await
    .expect("shutdown should finish");

  assert!(orch.is_shutting_down());
  assert_eq!(orch.limiter().in_flight(), 0);
  assert_eq!(orch.status(CacheDomain::Project), DomainStatus::InProgress);
  let report = orch.store().snapshot_report(CacheDomain::Project).unwrap();
  assert!(report.cancelled);
  assert!(report.succeeded < 10);

  let err = orch.resolve(CacheDomain::Project, "P1").await.unwrap_err();
  assert!(matches!(err, ResolveError::Limiter(LimiterError::Closed)));
  assert_eq!(orch.rescan(CacheDomain::Project), Err(RescanError::ShuttingDown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_domain_is_in_progress_while_enumerating() {
  let tree = DataTree::populated();
  let scanners = tree.scanners();
  let scanners = ScannerSet {
    translation: CountingScanner::slow_enumeration(scanners.translation.clone(), Duration::from_millis(500)),
    ..scanners
  };
  let orch = orchestrator(settings(), scanners);

  orch.start();
  tokio::time::sleep(Duration::from_millis(200)).await;
  assert_eq!(orch.status(CacheDomain::Translation), DomainStatus::InProgress);

  orch.wait_startup_settled().await;
  assert_eq!(orch.status(CacheDomain::Translation), DomainStatus::Complete);
}

#[tokio::test]
async fn test_rescan_picks_up_restored_versification() {
  let tree = DataTree::populated();
  let vref = tree.config().vref_path();
  std::fs::remove_file(&vref).unwrap();
  let orch = orchestrator(settings(), tree.scanners());

  orch.start();
  orch.wait_startup_settled().await;
  let before = orch.store().get(CacheDomain::Scripture, "en-KJV").unwrap();
  assert!(before.partial_error.as_deref().unwrap().starts_with("versification unavailable"));
  assert!(before.stats.as_scripture().unwrap().books.is_empty());

  std::fs::write(&vref, VREF).unwrap();
  orch.rescan(CacheDomain::Scripture).unwrap();
  orch.wait_idle().await;

  let after = orch.store().get(CacheDomain::Scripture, "en-KJV").unwrap();
  assert_eq!(after.partial_error, None);
  assert_eq!(after.stats.as_scripture().unwrap().books.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_idle_waits_all_return() {
  let tree = DataTree::populated();
  let counted = Counted::wrap(tree.scanners(), Duration::from_millis(20));
  let orch = orchestrator(settings(), counted.set());
  orch.start();

  let mut waits = Vec::new();
  for _ in 0..4 {
    let orch = orch.clone();
    waits.push(tokio::spawn(async move { orch.wait_idle().await }));
  }
  let shutdown = {
    let orch = orch.clone();
    tokio::spawn(async move { orch.shutdown().await })
  };

  for wait in waits {
    tokio::time::timeout(Duration::from_secs(5), wait)
      .await
      .expect("idle wait should return")
      .unwrap();
  }
  tokio::time::timeout(Duration::from_secs(5), shutdown)
    .await
    .expect("shutdown should return")
    .unwrap();
}
