//! List queries over cached entries.

use std::sync::Arc;

use crate::{
  model::CacheEntry,
  project::ProjectInfo,
  scripture::ScriptureStats,
  translation::DraftInfo,
};

/// Default page size for project listings
pub const DEFAULT_PROJECT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
  #[error("provide at least one of project_id or experiment_name")]
  MissingFilter,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.is_empty())
}

/// Scriptures whose name contains `query` (case-insensitive), sorted by name.
pub fn scriptures_matching<'a>(entries: &'a [Arc<CacheEntry>], query: Option<&str>) -> Vec<&'a ScriptureStats> {
  let needle = non_empty(query).map(str::to_lowercase);
  let mut matches: Vec<&ScriptureStats> = entries
    .iter()
    .filter_map(|e| e.stats.as_scripture())
    .filter(|s| needle.as_ref().is_none_or(|n| s.name.to_lowercase().contains(n.as_str())))
    .collect();
  matches.sort_by(|a, b| a.name.cmp(&b.name));
  matches
}

/// Projects newest first, optionally restricted to one scripture filename.
pub fn projects_page<'a>(
  entries: &'a [Arc<CacheEntry>],
  skip: usize,
  limit: usize,
  scripture_filename: Option<&str>,
) -> Vec<&'a ProjectInfo> {
  let filename = non_empty(scripture_filename);
  let mut projects: Vec<&ProjectInfo> = entries
    .iter()
    .filter_map(|e| e.stats.as_project())
    .filter(|p| filename.is_none_or(|f| p.scripture_filename == f))
    .collect();
  projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
  projects.into_iter().skip(skip).take(limit).collect()
}

/// Drafts for a project and/or experiment. At least one filter is required.
pub fn drafts_for<'a>(
  entries: &'a [Arc<CacheEntry>],
  project_id: Option<&str>,
  experiment_name: Option<&str>,
) -> Result<Vec<&'a DraftInfo>, QueryError> {
  let project_id = non_empty(project_id);
  let experiment_name = non_empty(experiment_name);
  if project_id.is_none() && experiment_name.is_none() {
    return Err(QueryError::MissingFilter);
  }

  Ok(
    entries
      .iter()
      .filter_map(|e| e.stats.as_translation())
      .filter(|d| project_id.is_none_or(|id| d.project_id == id))
      .filter(|d| experiment_name.is_none_or(|name| d.train_experiment_name == name))
      .collect(),
  )
}
