//! Test helpers for cache subsystem tests.
//!
//! `DataTree` builds a SILNLP data directory in a temp dir; `CountingScanner`
//! wraps a real scanner to count calls, add latency, and record how many
//! computations were in flight at once.

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::{
  cache::{CacheOrchestrator, OrchestratorSettings},
  config::Config,
  error::{DomainRootError, ItemError, ResolveError},
  model::{CacheDomain, ComputedStats, DomainStatus},
  project::SETTINGS_FILE,
  scan::{Candidate, DomainScanner, Enumeration, ScannerSet},
};

pub const VREF: &str = "GEN 1:1\nGEN 1:2\nMAT 1:1\n";

/// A temporary SILNLP data root.
pub struct DataTree {
  pub dir: TempDir,
}

impl DataTree {
  /// Empty domain roots plus a versification file.
  pub fn new() -> Self {
    let tree = Self {
      dir: TempDir::new().expect("create data dir"),
    };
    for domain in CacheDomain::ALL {
      std::fs::create_dir_all(tree.domain_root(domain)).expect("create domain root");
    }
    std::fs::write(tree.config().vref_path(), VREF).expect("write vref");
    tree
  }

  /// A tree with two items per domain.
  pub fn populated() -> Self {
    let tree = Self::new();
    tree.add_scripture("en-KJV", "In the beginning\nAnd the earth\nThe book\n");
    tree.add_scripture("de-LU", "Am Anfang\n\n\n");
    tree.add_experiment("Team/exp1", "tpi-ABC");
    tree.add_draft("Team/exp1", "41MAT.SFM");
    tree.add_draft("Team/exp1", "42MRK.SFM");
    tree.add_project("ABC", "tpi");
    tree.add_project("DEF", "en");
    tree
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  pub fn config(&self) -> Config {
    let mut config = Config::default();
    config.data.silnlp_data = self.root().to_path_buf();
    config
  }

  pub fn domain_root(&self, domain: CacheDomain) -> PathBuf {
    self.config().domain_root(domain)
  }

  pub fn scanners(&self) -> ScannerSet {
    ScannerSet::from_config(&self.config()).expect("build scanners")
  }

  pub fn add_scripture(&self, name: &str, content: &str) -> PathBuf {
    let path = self.domain_root(CacheDomain::Scripture).join(format!("{name}.txt"));
    std::fs::write(&path, content).expect("write scripture");
    path
  }

  pub fn add_project(&self, id: &str, iso: &str) -> PathBuf {
    self.write_settings(
      id,
      &format!("<ScriptureText><Name>{id}</Name><LanguageIsoCode>{iso}</LanguageIsoCode></ScriptureText>"),
    )
  }

  pub fn write_settings(&self, id: &str, xml: &str) -> PathBuf {
    let dir = self.domain_root(CacheDomain::Project).join(id);
    std::fs::create_dir_all(&dir).expect("create project dir");
    std::fs::write(dir.join(SETTINGS_FILE), xml).expect("write settings");
    dir
  }

  pub fn add_experiment(&self, experiment: &str, target: &str) {
    let dir = self.domain_root(CacheDomain::Translation).join(experiment);
    std::fs::create_dir_all(&dir).expect("create experiment dir");
    std::fs::write(
      dir.join("config.yml"),
      format!("data:\n  corpus_pairs:\n    - src: en-KJV\n      trg: {target}\n"),
    )
    .expect("write experiment config");
  }

  /// Add a draft under checkpoint `1000`, source `en-KJV`. Returns its key.
  pub fn add_draft(&self, experiment: &str, file: &str) -> String {
    let key = format!("{experiment}/infer/1000/en-KJV/{file}");
    let path = self.domain_root(CacheDomain::Translation).join(&key);
    std::fs::create_dir_all(path.parent().expect("draft parent")).expect("create draft dir");
    std::fs::write(&path, "\\id BOOK").expect("write draft");
    key
  }
}

// ============================================================================
// Instrumented scanner
// ============================================================================

/// In-flight counter shared by several scanners.
#[derive(Debug, Default)]
pub struct Probe {
  in_flight: AtomicUsize,
  peak: AtomicUsize,
}

impl Probe {
  pub fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

#[derive(Debug)]
pub struct CountingScanner {
  inner: Arc<dyn DomainScanner>,
  delay: Duration,
  /// Added to every enumeration (runs on a blocking thread)
  enumerate_delay: Duration,
  probe: Arc<Probe>,
  pub enumerations: AtomicUsize,
  pub computations: AtomicUsize,
}

impl CountingScanner {
  pub fn new(inner: Arc<dyn DomainScanner>, delay: Duration, probe: Arc<Probe>) -> Arc<Self> {
    Arc::new(Self {
      inner,
      delay,
      enumerate_delay: Duration::ZERO,
      probe,
      enumerations: AtomicUsize::new(0),
      computations: AtomicUsize::new(0),
    })
  }

  /// A scanner whose enumeration takes at least `delay`.
  pub fn slow_enumeration(inner: Arc<dyn DomainScanner>, delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      inner,
      delay: Duration::ZERO,
      enumerate_delay: delay,
      probe: Arc::new(Probe::default()),
      enumerations: AtomicUsize::new(0),
      computations: AtomicUsize::new(0),
    })
  }

  pub fn enumerations(&self) -> usize {
    self.enumerations.load(Ordering::SeqCst)
  }

  pub fn computations(&self) -> usize {
    self.computations.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl DomainScanner for CountingScanner {
  fn domain(&self) -> CacheDomain {
    self.inner.domain()
  }

  fn root(&self) -> &Path {
    self.inner.root()
  }

  fn enumerate(&self) -> Result<Enumeration, DomainRootError> {
    self.enumerations.fetch_add(1, Ordering::SeqCst);
    if !self.enumerate_delay.is_zero() {
      std::thread::sleep(self.enumerate_delay);
    }
    self.inner.enumerate()
  }

  fn locate(&self, key: &str) -> Result<Candidate, ResolveError> {
    self.inner.locate(key)
  }

  async fn compute(&self, candidate: &Candidate) -> Result<ComputedStats, ItemError> {
    self.computations.fetch_add(1, Ordering::SeqCst);
    let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.probe.peak.fetch_max(now, Ordering::SeqCst);

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    let result = self.inner.compute(candidate).await;

    self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

/// The three scanners of a tree, each wrapped in a `CountingScanner`.
pub struct Counted {
  pub scripture: Arc<CountingScanner>,
  pub translation: Arc<CountingScanner>,
  pub project: Arc<CountingScanner>,
  pub probe: Arc<Probe>,
}

impl Counted {
  pub fn wrap(scanners: ScannerSet, delay: Duration) -> Self {
    let probe = Arc::new(Probe::default());
    Self {
      scripture: CountingScanner::new(scanners.scripture, delay, probe.clone()),
      translation: CountingScanner::new(scanners.translation, delay, probe.clone()),
      project: CountingScanner::new(scanners.project, delay, probe.clone()),
      probe,
    }
  }

  pub fn get(&self, domain: CacheDomain) -> &Arc<CountingScanner> {
    match domain {
      CacheDomain::Scripture => &self.scripture,
      CacheDomain::Translation => &self.translation,
      CacheDomain::Project => &self.project,
    }
  }

  pub fn set(&self) -> ScannerSet {
    ScannerSet {
      scripture: self.scripture.clone(),
      translation: self.translation.clone(),
      project: self.project.clone(),
    }
  }
}

// ============================================================================
// Orchestrator helpers
// ============================================================================

pub fn orchestrator(settings: OrchestratorSettings, scanners: ScannerSet) -> CacheOrchestrator {
  CacheOrchestrator::new(settings, scanners, CancellationToken::new())
}

/// Wait (bounded) until a domain's status satisfies `pred`.
pub async fn wait_for_status(
  orchestrator: &CacheOrchestrator,
  domain: CacheDomain,
  pred: impl Fn(DomainStatus) -> bool,
) -> DomainStatus {
  let mut rx = orchestrator.store().subscribe(domain);
  let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(*s)))
    .await
    .expect("status wait timed out")
    .expect("status channel closed");
  *status
}
