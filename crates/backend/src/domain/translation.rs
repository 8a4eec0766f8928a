//! Drafts produced by translation experiments.
//!
//! Inference output lives under the experiments root as
//! `<experiment...>/infer/<checkpoint>/<source>/<NN><BOOK>.SFM`, next to the
//! experiment's `config.yml`, which names the corpus pair that was trained.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const INFER_DIR: &str = "infer";
pub const EXPERIMENT_CONFIG: &str = "config.yml";

/// Position of a draft file inside an experiment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLayout {
  /// Path components from the experiments root to the experiment directory
  pub experiment: Vec<String>,
  pub checkpoint: String,
  pub source: String,
  pub file: String,
}

impl DraftLayout {
  /// Split a path relative to the experiments root.
  ///
  /// The last `infer` component must be followed by exactly
  /// `checkpoint/source/file` and preceded by at least one component.
  pub fn from_relative(relative: &Path) -> Result<Self, String> {
    let mut parts = Vec::new();
    for component in relative.components() {
      match component {
        Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        _ => return Err(format!("unexpected component in {}", relative.display())),
      }
    }

    let infer = parts
      .iter()
      .rposition(|p| p == INFER_DIR)
      .ok_or_else(|| format!("no '{INFER_DIR}' directory in path"))?;

    if infer == 0 {
      return Err(format!("'{INFER_DIR}' is not inside an experiment"));
    }
    if parts.len() != infer + 4 {
      return Err(format!("expected {INFER_DIR}/<checkpoint>/<source>/<file>"));
    }

    let file = parts[infer + 3].clone();
    let source = parts[infer + 2].clone();
    let checkpoint = parts[infer + 1].clone();
    parts.truncate(infer);

    Ok(Self {
      experiment: parts,
      checkpoint,
      source,
      file,
    })
  }

  pub fn experiment_name(&self) -> String {
    self.experiment.join("/")
  }

  pub fn config_path(&self, experiments_root: &Path) -> PathBuf {
    let mut path = experiments_root.to_path_buf();
    path.extend(&self.experiment);
    path.join(EXPERIMENT_CONFIG)
  }

  pub fn book_name(&self) -> String {
    book_name_from_file(&self.file)
  }
}

/// Book name from a draft file name: drop the two leading digits and the extension.
pub fn book_name_from_file(file_name: &str) -> String {
  let rest: String = file_name.chars().skip(2).collect();
  rest.split('.').next().unwrap_or_default().to_string()
}

/// First corpus pair of an experiment config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPair {
  pub src: Vec<String>,
  pub trg: Vec<String>,
}

impl CorpusPair {
  /// Read `data.corpus_pairs[0]`. `src` and `trg` may each be a string or a list.
  pub fn first_in(config: &serde_yaml::Value) -> Option<Self> {
    let pair = config.get("data")?.get("corpus_pairs")?.get(0)?;
    let src = string_or_list(pair.get("src"));
    let trg = string_or_list(pair.get("trg"));
    if trg.is_empty() {
      return None;
    }
    Some(Self { src, trg })
  }

  /// Target project id: the last `-` segment of the first target corpus.
  pub fn target_project_id(&self) -> Option<&str> {
    self.trg.first().and_then(|t| t.rsplit('-').next()).filter(|s| !s.is_empty())
  }

  pub fn languages(&self) -> LanguagePair {
    let mut source: Vec<String> = Vec::new();
    for corpus in &self.src {
      let iso = iso_code(corpus);
      if !source.contains(&iso) {
        source.push(iso);
      }
    }
    LanguagePair {
      source,
      target: self.trg.first().map(|t| iso_code(t)).unwrap_or_default(),
    }
  }
}

fn string_or_list(value: Option<&serde_yaml::Value>) -> Vec<String> {
  match value {
    Some(serde_yaml::Value::String(s)) => vec![s.clone()],
    Some(serde_yaml::Value::Sequence(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
    _ => Vec::new(),
  }
}

/// Corpus names are `<iso>-<project>`.
fn iso_code(corpus: &str) -> String {
  corpus.split('-').next().unwrap_or(corpus).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguagePair {
  pub source: Vec<String>,
  pub target: String,
}

/// Metadata for one draft file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftInfo {
  pub project_id: String,
  pub train_experiment_name: String,
  pub checkpoint: String,
  pub source_scripture_name: String,
  pub book_name: String,
  pub has_pdf: bool,
  pub languages: LanguagePair,
  pub size_bytes: u64,
  pub modified_at: Option<DateTime<Utc>>,
  pub path: PathBuf,
}
