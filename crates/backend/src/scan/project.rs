//! Project scanner: Paratext project directories and their `Settings.xml`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Candidate, DomainScanner, Enumeration, check_root, validate_key};
use crate::{
  config::Config,
  error::{DomainRootError, ItemError, ResolveError},
  model::{CacheDomain, ComputedStats, EntryStats},
  project::{PROJECTS_BY_ID_DIR, ProjectInfo, SETTINGS_FILE, SettingsError, parse_settings},
};

#[derive(Debug, Clone)]
pub struct ProjectScanner {
  root: PathBuf,
}

impl ProjectScanner {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.domain_root(CacheDomain::Project))
  }

  /// Add every directory in `dir` as a candidate.
  fn collect_dirs(&self, dir: &Path, enumeration: &mut Enumeration) {
    let entries = match std::fs::read_dir(dir) {
      Ok(entries) => entries,
      Err(e) => {
        enumeration.fail(dir.display().to_string(), e);
        return;
      }
    };

    for entry in entries {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          enumeration.fail(dir.display().to_string(), e);
          continue;
        }
      };

      let key = entry.file_name().to_string_lossy().into_owned();
      if key == PROJECTS_BY_ID_DIR {
        continue;
      }

      match std::fs::metadata(entry.path()) {
        Ok(metadata) if metadata.is_dir() => enumeration.candidates.push(Candidate::new(key, entry.path())),
        Ok(_) => {}
        Err(e) => enumeration.fail(key, e),
      }
    }
  }
}

#[async_trait]
impl DomainScanner for ProjectScanner {
  fn domain(&self) -> CacheDomain {
    CacheDomain::Project
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn enumerate(&self) -> Result<Enumeration, DomainRootError> {
    check_root(CacheDomain::Project, &self.root)?;

    let mut enumeration = Enumeration::default();
    self.collect_dirs(&self.root, &mut enumeration);

    let by_id = self.root.join(PROJECTS_BY_ID_DIR);
    if by_id.is_dir() {
      self.collect_dirs(&by_id, &mut enumeration);
    }

    // Top-level directories win over `_projectsById` entries with the same name
    Ok(enumeration.finish())
  }

  fn locate(&self, key: &str) -> Result<Candidate, ResolveError> {
    check_root(CacheDomain::Project, &self.root)?;
    validate_key(CacheDomain::Project, key, false)?;
    if key == PROJECTS_BY_ID_DIR {
      return Err(ResolveError::invalid_key(CacheDomain::Project, key, "reserved directory name"));
    }

    [self.root.join(key), self.root.join(PROJECTS_BY_ID_DIR).join(key)]
      .into_iter()
      .find(|path| path.is_dir())
      .map(|path| Candidate::new(key, path))
      .ok_or_else(|| ResolveError::not_found(CacheDomain::Project, key))
  }

  async fn compute(&self, candidate: &Candidate) -> Result<ComputedStats, ItemError> {
    let settings_path = candidate.path.join(SETTINGS_FILE);
    let xml = tokio::fs::read_to_string(&settings_path)
      .await
      .map_err(|e| ItemError::io(&settings_path, e))?;

    let settings = parse_settings(&xml).map_err(|e| match e {
      SettingsError::Xml(source) => ItemError::Xml {
        path: settings_path.clone(),
        source,
      },
      other => ItemError::malformed(&settings_path, other.to_string()),
    })?;

    let (created_at, partial_error) = match tokio::fs::metadata(&candidate.path).await {
      Ok(metadata) => match metadata.created().or_else(|_| metadata.modified()) {
        Ok(time) => (DateTime::<Utc>::from(time), None),
        Err(e) => (DateTime::<Utc>::UNIX_EPOCH, Some(format!("creation time unavailable: {e}"))),
      },
      Err(e) => (DateTime::<Utc>::UNIX_EPOCH, Some(format!("creation time unavailable: {e}"))),
    };

    let path = std::path::absolute(&candidate.path).unwrap_or_else(|_| candidate.path.clone());
    let stats = EntryStats::Project(ProjectInfo::new(&candidate.key, path, settings, created_at));

    Ok(match partial_error {
      None => ComputedStats::complete(stats),
      Some(reason) => ComputedStats::partial(stats, reason),
    })
  }
}
