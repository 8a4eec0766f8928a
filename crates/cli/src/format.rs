//! Human-readable rendering of reports and cache entries.
//!
//! Every function returns a `String` ending in a newline; commands print it.

use std::fmt::Write;

use silauto::{
  DiagnosticReport, DirectoryState, HealthReport,
  model::{CacheEntry, EntryStats},
  project::ProjectInfo,
  scripture::ScriptureStats,
  translation::DraftInfo,
};

// ============================================================================
// Reports
// ============================================================================

pub fn format_health(health: &HealthReport) -> String {
  let mut out = String::new();

  for domain in &health.domains {
    let _ = writeln!(out, "{:<12} {}", domain.domain.as_str(), domain.status);
    let _ = writeln!(out, "  Items:      {}", domain.item_count);
    if let Some(ms) = domain.last_scan_duration_ms {
      let _ = writeln!(out, "  Last scan:  {}", format_millis(ms));
    }
    if domain.failure_count > 0 {
      let _ = writeln!(out, "  Failures:   {} ({})", domain.failure_count, domain.failed_keys.join(", "));
    }
    if let Some(error) = &domain.root_error {
      let _ = writeln!(out, "  Root error: {}", error);
    }
  }

  let _ = writeln!(out, "\n--- Limiter ---");
  let _ = writeln!(
    out,
    "Capacity: {}  Peak: {}  Admitted: {}",
    health.limiter.capacity, health.limiter.peak, health.limiter.admitted
  );

  let _ = writeln!(out, "\n--- Startup ---");
  if health.startup.skipped {
    let _ = writeln!(out, "Startup scans skipped, items resolve on demand");
  }
  match health.startup.settled_after_ms {
    Some(ms) => {
      let _ = writeln!(out, "Settled after {}", format_millis(ms));
    }
    None => {
      let _ = writeln!(out, "{} domain(s) still scanning", health.startup.pending_domains);
    }
  }
  out
}

pub fn format_diagnostics(report: &DiagnosticReport) -> String {
  let mut out = String::new();

  let _ = writeln!(out, "--- Directories ---");
  for check in &report.directories {
    let state = match &check.state {
      DirectoryState::Ok { file_count } => format!("ok ({} files)", file_count),
      DirectoryState::Missing => "MISSING".to_string(),
      DirectoryState::NotADirectory => "NOT A DIRECTORY".to_string(),
      DirectoryState::Unreadable { error } => format!("UNREADABLE ({})", error),
    };
    let _ = writeln!(out, "{:<12} {:?}: {}", check.domain.as_str(), check.path, state);
  }

  let _ = writeln!(out, "\n--- Timings ---");
  for timing in &report.timings {
    let _ = write!(
      out,
      "{:<12} {:>10}  {:>5.1}%  {} items",
      timing.domain.as_str(),
      format_millis(timing.duration_ms),
      timing.share * 100.0,
      timing.item_count
    );
    if timing.failure_count > 0 {
      let _ = write!(out, ", {} failed", timing.failure_count);
    }
    if let Some(error) = &timing.root_error {
      let _ = write!(out, " (root error: {})", error);
    }
    let _ = writeln!(out);
  }
  let _ = writeln!(out, "{:<12} {:>10}", "total", format_millis(report.total_ms));

  if !report.recommendations.is_empty() {
    let _ = writeln!(out, "\n--- Recommendations ---");
    for recommendation in &report.recommendations {
      let _ = writeln!(out, "{}:", recommendation.subject);
      for action in &recommendation.actions {
        let _ = writeln!(out, "  - {}", action);
      }
    }
  }
  out
}

// ============================================================================
// Entries
// ============================================================================

pub fn format_entry(entry: &CacheEntry) -> String {
  let mut out = match &entry.stats {
    EntryStats::Scripture(stats) => format_scripture(stats),
    EntryStats::Translation(draft) => format_draft(draft),
    EntryStats::Project(project) => format_project(project),
  };
  let _ = writeln!(out, "Computed:   {}", entry.computed_at.format("%Y-%m-%d %H:%M:%S UTC"));
  if let Some(error) = &entry.partial_error {
    let _ = writeln!(out, "Warning:    {}", error);
  }
  out
}

fn format_scripture(stats: &ScriptureStats) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Scripture:  {} ({})", stats.name, stats.lang_code);
  let _ = writeln!(out, "Path:       {:?}", stats.path);
  let _ = writeln!(
    out,
    "Verses:     {}/{} ({:.1}%), {} ranges",
    stats.verse_count,
    stats.line_count,
    stats.coverage * 100.0,
    stats.range_count
  );
  let _ = writeln!(
    out,
    "Testaments: OT {}  NT {}  DT {}",
    stats.testaments.ot, stats.testaments.nt, stats.testaments.dt
  );
  if !stats.complete_books.is_empty() {
    let _ = writeln!(out, "Complete:   {}", stats.complete_books.join(" "));
  }
  out
}

fn format_draft(draft: &DraftInfo) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Draft:      {} ({})", draft.book_name, draft.project_id);
  let _ = writeln!(out, "Experiment: {} @ {}", draft.train_experiment_name, draft.checkpoint);
  let _ = writeln!(out, "Source:     {}", draft.source_scripture_name);
  let _ = writeln!(
    out,
    "Languages:  {} -> {}",
    draft.languages.source.join(","),
    draft.languages.target
  );
  let _ = writeln!(out, "Size:       {} bytes{}", draft.size_bytes, if draft.has_pdf { ", has PDF" } else { "" });
  let _ = writeln!(out, "Path:       {:?}", draft.path);
  out
}

fn format_project(project: &ProjectInfo) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Project:    {} ({})", project.name, project.id);
  if !project.full_name.is_empty() {
    let _ = writeln!(out, "Full name:  {}", project.full_name);
  }
  let _ = writeln!(out, "Language:   {} [{}]", project.lang, project.iso_code);
  let _ = writeln!(out, "Scripture:  {}", project.scripture_filename);
  let _ = writeln!(out, "Created:    {}", project.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
  let _ = writeln!(out, "Path:       {:?}", project.path);
  out
}

// ============================================================================
// Lists
// ============================================================================

pub fn format_scriptures(scriptures: &[&ScriptureStats]) -> String {
  if scriptures.is_empty() {
    return "No scriptures found.\n".to_string();
  }
  let mut out = String::new();
  for s in scriptures {
    let _ = writeln!(out, "{:<24} {:>6} verses  {:>5.1}%", s.name, s.verse_count, s.coverage * 100.0);
  }
  out
}

pub fn format_projects(projects: &[&ProjectInfo]) -> String {
  if projects.is_empty() {
    return "No projects found.\n".to_string();
  }
  let mut out = String::new();
  for p in projects {
    let _ = writeln!(
      out,
      "{:<16} {:<24} {}",
      p.id,
      p.scripture_filename,
      p.created_at.format("%Y-%m-%d")
    );
  }
  out
}

pub fn format_drafts(drafts: &[&DraftInfo]) -> String {
  if drafts.is_empty() {
    return "No drafts found.\n".to_string();
  }
  let mut out = String::new();
  for d in drafts {
    let _ = writeln!(
      out,
      "{:<24} {:>8} {:<12} {:<6} {}",
      d.train_experiment_name,
      d.checkpoint,
      d.source_scripture_name,
      d.book_name,
      d.project_id
    );
  }
  out
}

fn format_millis(ms: u64) -> String {
  if ms < 1000 {
    format!("{} ms", ms)
  } else if ms < 60_000 {
    format!("{:.2} s", ms as f64 / 1000.0)
  } else {
    format!("{} min {} sec", ms / 60_000, (ms % 60_000) / 1000)
  }
}
