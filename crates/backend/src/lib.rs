mod cache;
mod scan;

mod domain;
pub use domain::{cache as model, config, project, scripture, translation};

pub mod dirs;
pub mod error;

pub use cache::{
  CacheOrchestrator, CacheStore, DEFAULT_PROJECT_LIMIT, DiagnosticReport, DirectoryCheck, DirectoryState,
  DomainHealth, DomainMode, DomainTiming, HealthReport, OrchestratorSettings, QueryError, Recommendation,
  RescanScheduler, ResolveOrigin, Resolution, StartupSummary, drafts_for, projects_page, run_diagnostics,
  scriptures_matching,
};
pub use scan::{
  Candidate, ConcurrencyLimiter, DEFAULT_MAX_CONCURRENT, DomainScanner, Enumeration, LimiterPermit, LimiterStats,
  ProjectScanner, ScannerSet, ScriptureScanner, TranslationScanner,
};

mod daemon;
pub use daemon::{Daemon, RuntimeConfig};
