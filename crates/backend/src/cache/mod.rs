//! Cache store, orchestration and diagnostics.

mod diagnostics;
mod orchestrator;
mod query;
mod scheduler;
mod store;

#[cfg(test)]
mod __tests__;

pub use diagnostics::{
  DiagnosticReport, DirectoryCheck, DirectoryState, DomainHealth, DomainTiming, HealthReport, Recommendation,
  StartupSummary, run_diagnostics,
};
pub use orchestrator::{CacheOrchestrator, DomainMode, OrchestratorSettings, Resolution, ResolveOrigin};
pub use query::{DEFAULT_PROJECT_LIMIT, QueryError, drafts_for, projects_page, scriptures_matching};
pub use scheduler::RescanScheduler;
pub use store::CacheStore;
