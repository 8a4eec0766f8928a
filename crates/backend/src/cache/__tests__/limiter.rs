//! The concurrency ceiling is global: bulk scans of every domain and lazy
//! resolution share one limiter.

use std::{sync::Arc, time::Duration};

use super::helpers::{Counted, DataTree, orchestrator};
use crate::{
  cache::OrchestratorSettings,
  model::{CacheDomain, DomainStatus},
  scan::ConcurrencyLimiter,
};

fn wide_tree() -> DataTree {
  let tree = DataTree::new();
  tree.add_experiment("Team/exp1", "tpi-ABC");
  for i in 0..6 {
    tree.add_scripture(&format!("en-T{i}"), "a\nb\nc\n");
    tree.add_draft("Team/exp1", &format!("{:02}BK{i}.SFM", 40 + i));
    tree.add_project(&format!("P{i}"), "en");
  }
  tree
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ceiling_holds_across_domains_and_lazy_reads() {
  let tree = wide_tree();
  let counted = Counted::wrap(tree.scanners(), Duration::from_millis(25));
  let orch = orchestrator(
    OrchestratorSettings {
      max_concurrent: 3,
      ..OrchestratorSettings::default()
    },
    counted.set(),
  );

  orch.start();

  let mut lazy = Vec::new();
  for i in 0..6 {
    let orch = orch.clone();
    lazy.push(tokio::spawn(async move {
      orch.resolve(CacheDomain::Project, &format!("P{i}")).await.map(|_| ())
    }));
  }
  for handle in lazy {
    handle.await.unwrap().unwrap();
  }
  orch.wait_startup_settled().await;

  for domain in CacheDomain::ALL {
    assert_eq!(orch.status(domain), DomainStatus::Complete, "{domain}");
  }
  assert!(counted.probe.peak() <= 3, "peak {} exceeded ceiling", counted.probe.peak());
  assert!(orch.limiter().stats().peak <= 3);
  assert_eq!(orch.limiter().in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_units_past_acquire_never_exceed_ceiling() {
  let limiter = ConcurrencyLimiter::new(4);
  let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
  let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

  let mut handles = Vec::new();
  for _ in 0..40 {
    let limiter = limiter.clone();
    let active = active.clone();
    let peak = peak.clone();
    handles.push(tokio::spawn(async move {
      let _permit = limiter.acquire().await.unwrap();
      let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
      peak.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(5)).await;
      active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 4);
  let stats = limiter.stats();
  assert_eq!(stats.admitted, 40);
  assert!(stats.peak <= 4);
  assert_eq!(stats.in_flight, 0);
}
