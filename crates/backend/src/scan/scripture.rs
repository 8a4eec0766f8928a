//! Scripture scanner: `*.txt` verse files directly under `MT/scripture`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::SystemTime,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Candidate, DomainScanner, Enumeration, check_root, validate_key};
use crate::{
  config::Config,
  error::{DomainRootError, ItemError, ResolveError},
  model::{CacheDomain, ComputedStats, EntryStats},
  scripture::{ScriptureStats, Versification, VersificationError},
};

const EXTENSION: &str = "txt";

/// Modification time and length of the file a versification was parsed from
type Stamp = (Option<SystemTime>, u64);

/// The versification file, parsed on first use and again whenever it changes.
///
/// Every read checks the file first, so a vref that is missing or broken
/// when the scanner is built is picked up by the next computation once fixed.
/// Failures are never kept.
#[derive(Debug)]
struct VersificationFile {
  path: PathBuf,
  parsed: Mutex<Option<(Stamp, Arc<Versification>)>>,
}

impl VersificationFile {
  fn new(path: PathBuf) -> Self {
    Self {
      path,
      parsed: Mutex::new(None),
    }
  }

  async fn current(&self) -> Result<Arc<Versification>, String> {
    let metadata = match tokio::fs::metadata(&self.path).await {
      Ok(metadata) => metadata,
      Err(source) => {
        let error = VersificationError::Io {
          path: self.path.clone(),
          source,
        };
        debug!(error = %error, "Versification unavailable");
        return Err(error.to_string());
      }
    };
    let stamp = (metadata.modified().ok(), metadata.len());

    // Held across the load so concurrent computations parse the file once
    let mut parsed = self.parsed.lock().await;
    if let Some((seen, vref)) = parsed.as_ref()
      && *seen == stamp
    {
      return Ok(vref.clone());
    }

    let path = self.path.clone();
    let loaded = match tokio::task::spawn_blocking(move || Versification::load(&path)).await {
      Ok(result) => result.map_err(|e| e.to_string()),
      Err(e) => Err(format!("versification load task failed: {e}")),
    };

    match loaded {
      Ok(vref) => {
        let vref = Arc::new(vref);
        debug!(path = %self.path.display(), verses = vref.len(), "Versification loaded");
        *parsed = Some((stamp, vref.clone()));
        Ok(vref)
      }
      Err(reason) => {
        warn!(path = %self.path.display(), error = %reason, "Versification unusable, scripture stats will be partial");
        *parsed = None;
        Err(reason)
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct ScriptureScanner {
  root: PathBuf,
  vref_path: PathBuf,
  versification: Arc<VersificationFile>,
}

impl ScriptureScanner {
  /// Does no I/O; the versification is read on the first computation.
  pub fn new(root: PathBuf, vref_path: PathBuf) -> Self {
    Self {
      root,
      versification: Arc::new(VersificationFile::new(vref_path.clone())),
      vref_path,
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.domain_root(CacheDomain::Scripture), config.vref_path())
  }

  fn is_candidate_path(&self, path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION) && path != self.vref_path
  }
}

#[async_trait]
impl DomainScanner for ScriptureScanner {
  fn domain(&self) -> CacheDomain {
    CacheDomain::Scripture
  }

  fn root(&self) -> &Path {
    &self.root
  }

  fn enumerate(&self) -> Result<Enumeration, DomainRootError> {
    check_root(CacheDomain::Scripture, &self.root)?;

    let entries = std::fs::read_dir(&self.root).map_err(|source| DomainRootError::Unreadable {
      domain: CacheDomain::Scripture,
      path: self.root.clone(),
      source,
    })?;

    let mut enumeration = Enumeration::default();
    for entry in entries {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          enumeration.fail(self.root.display().to_string(), e);
          continue;
        }
      };

      let path = entry.path();
      if !self.is_candidate_path(&path) {
        continue;
      }
      let Some(key) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        continue;
      };

      // Follows symlinks
      match std::fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => enumeration.candidates.push(Candidate::new(key, path)),
        Ok(_) => {}
        Err(e) => enumeration.fail(key, e),
      }
    }

    Ok(enumeration.finish())
  }

  fn locate(&self, key: &str) -> Result<Candidate, ResolveError> {
    check_root(CacheDomain::Scripture, &self.root)?;
    validate_key(CacheDomain::Scripture, key, false)?;

    let path = self.root.join(format!("{key}.{EXTENSION}"));
    if !self.is_candidate_path(&path) || !path.is_file() {
      return Err(ResolveError::not_found(CacheDomain::Scripture, key));
    }
    Ok(Candidate::new(key, path))
  }

  async fn compute(&self, candidate: &Candidate) -> Result<ComputedStats, ItemError> {
    let bytes = tokio::fs::read(&candidate.path)
      .await
      .map_err(|e| ItemError::io(&candidate.path, e))?;
    let content = String::from_utf8(bytes).map_err(|_| ItemError::malformed(&candidate.path, "not valid UTF-8"))?;

    let path = std::path::absolute(&candidate.path).unwrap_or_else(|_| candidate.path.clone());
    let versification = self.versification.current().await;
    let stats = ScriptureStats::compute(&candidate.key, &path, &content, versification.as_deref().ok())
      .map_err(|e| ItemError::malformed(&candidate.path, e.to_string()))?;

    let stats = EntryStats::Scripture(stats);
    Ok(match versification {
      Ok(_) => ComputedStats::complete(stats),
      Err(reason) => ComputedStats::partial(stats, format!("versification unavailable: {reason}")),
    })
  }
}
