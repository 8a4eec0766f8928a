//! Translation scanner: draft files under `MT/experiments` matching a glob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use super::{Candidate, DomainScanner, Enumeration, check_root, relative_key, validate_key};
use crate::{
  config::{Config, DEFAULT_TRANSLATION_GLOB},
  error::{ConfigError, DomainRootError, ItemError, ResolveError},
  model::{CacheDomain, ComputedStats, EntryStats},
  translation::{CorpusPair, DraftInfo, DraftLayout},
};

#[derive(Debug, Clone)]
pub struct TranslationScanner {
  root: PathBuf,
  pattern: String,
  matcher: GlobMatcher,
  /// Walk depth implied by the pattern; unbounded when it contains `**`
  max_depth: Option<usize>,
}

impl TranslationScanner {
  pub fn new(root: PathBuf, pattern: &str) -> Result<Self, ConfigError> {
    let matcher = GlobBuilder::new(pattern)
      .literal_separator(true)
      .build()
      .map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
      })?
      .compile_matcher();

    let max_depth = (!pattern.contains("**")).then(|| pattern.split('/').filter(|s| !s.is_empty()).count());

    Ok(Self {
      root,
      pattern: pattern.to_string(),
      matcher,
      max_depth,
    })
  }

  pub fn with_default_pattern(root: PathBuf) -> Result<Self, ConfigError> {
    Self::new(root, DEFAULT_TRANSLATION_GLOB)
  }

  pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
    Self::new(config.domain_root(CacheDomain::Translation), &config.data.translation_glob)
  }

  pub fn pattern(&self) -> &str {
    &self.pattern
  }
}

#[async_trait]
impl DomainScanner for TranslationScanner {
  fn domain(&self) -> CacheDomain {
    CacheDomain::Translation
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn enumerate(&self) -> Result<Enumeration, DomainRootError> {
    check_root(CacheDomain::Translation, &self.root)?;

    let mut walker = WalkDir::new(&self.root).follow_links(true).min_depth(1);
    if let Some(depth) = self.max_depth {
      walker = walker.max_depth(depth);
    }

    let mut enumeration = Enumeration::default();
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          let key = e
            .path()
            .and_then(|p| p.strip_prefix(&self.root).ok())
            .map(relative_key)
            .unwrap_or_else(|| self.root.display().to_string());
          enumeration.fail(key, e);
          continue;
        }
      };

      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(&self.root) else {
        continue;
      };
      if self.matcher.is_match(relative) {
        enumeration
          .candidates
          .push(Candidate::new(relative_key(relative), entry.path()));
      }
    }

    Ok(enumeration.finish())
  }

  fn locate(&self, key: &str) -> Result<Candidate, ResolveError> {
    check_root(CacheDomain::Translation, &self.root)?;
    validate_key(CacheDomain::Translation, key, true)?;

    if !self.matcher.is_match(key) {
      return Err(ResolveError::invalid_key(
        CacheDomain::Translation,
        key,
        format!("does not match '{}'", self.pattern),
      ));
    }

    let path = self.root.join(key);
    if !path.is_file() {
      return Err(ResolveError::not_found(CacheDomain::Translation, key));
    }
    Ok(Candidate::new(key, path))
  }

  async fn compute(&self, candidate: &Candidate) -> Result<ComputedStats, ItemError> {
    let layout =
      DraftLayout::from_relative(Path::new(&candidate.key)).map_err(|reason| ItemError::malformed(&candidate.path, reason))?;

    let config_path = layout.config_path(&self.root);
    let raw = tokio::fs::read_to_string(&config_path)
      .await
      .map_err(|e| ItemError::io(&config_path, e))?;
    let experiment: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|source| ItemError::Yaml {
      path: config_path.clone(),
      source,
    })?;

    let pair = CorpusPair::first_in(&experiment)
      .ok_or_else(|| ItemError::malformed(&config_path, "no target corpus in data.corpus_pairs"))?;
    let project_id = pair
      .target_project_id()
      .ok_or_else(|| ItemError::malformed(&config_path, "target corpus has no project id"))?
      .to_string();

    let metadata = tokio::fs::metadata(&candidate.path)
      .await
      .map_err(|e| ItemError::io(&candidate.path, e))?;

    let (has_pdf, partial_error) = match tokio::fs::try_exists(candidate.path.with_extension("pdf")).await {
      Ok(exists) => (exists, None),
      Err(e) => (false, Some(format!("could not check for PDF: {e}"))),
    };

    let draft = DraftInfo {
      project_id,
      train_experiment_name: layout.experiment_name(),
      checkpoint: layout.checkpoint.clone(),
      source_scripture_name: layout.source.clone(),
      book_name: layout.book_name(),
      has_pdf,
      languages: pair.languages(),
      size_bytes: metadata.len(),
      modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
      path: std::path::absolute(&candidate.path).unwrap_or_else(|_| candidate.path.clone()),
    };

    let stats = EntryStats::Translation(draft);
    Ok(match partial_error {
      None => ComputedStats::complete(stats),
      Some(reason) => ComputedStats::partial(stats, reason),
    })
  }
}
