//! Paratext projects and their `Settings.xml` metadata.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SETTINGS_FILE: &str = "Settings.xml";
/// Subdirectory holding projects stored by id
pub const PROJECTS_BY_ID_DIR: &str = "_projectsById";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
  #[error(transparent)]
  Xml(#[from] roxmltree::Error),
  #[error("missing required element <{0}>")]
  MissingElement(&'static str),
}

/// Fields read from a project's `Settings.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
  pub name: String,
  pub full_name: String,
  pub language: String,
  /// `LanguageIsoCode` up to the first `:`
  pub iso_code: String,
  /// Every text-only child of the root element
  pub attributes: BTreeMap<String, String>,
}

/// Parse settings XML. `Name` and `LanguageIsoCode` must be present and non-empty.
pub fn parse_settings(xml: &str) -> Result<ProjectSettings, SettingsError> {
  let doc = roxmltree::Document::parse(xml)?;

  let mut attributes = BTreeMap::new();
  for child in doc.root_element().children().filter(|n| n.is_element()) {
    if child.children().any(|n| n.is_element()) {
      continue;
    }
    let text = child.text().unwrap_or_default().trim().to_string();
    attributes.insert(child.tag_name().name().to_string(), text);
  }

  let field = |tag: &str| attributes.get(tag).filter(|v| !v.is_empty()).cloned();

  let name = field("Name").ok_or(SettingsError::MissingElement("Name"))?;
  let iso_code = field("LanguageIsoCode").ok_or(SettingsError::MissingElement("LanguageIsoCode"))?;
  let iso_code = iso_code.split(':').next().unwrap_or_default().to_string();
  let full_name = field("FullName").unwrap_or_default();
  let language = field("Language").unwrap_or_default();

  Ok(ProjectSettings {
    name,
    full_name,
    language,
    iso_code,
    attributes,
  })
}

/// A project directory with parsed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
  pub id: String,
  pub name: String,
  pub full_name: String,
  pub lang: String,
  pub iso_code: String,
  pub path: PathBuf,
  pub created_at: DateTime<Utc>,
  /// Name of the extracted scripture file (`<iso>-<id>`)
  pub scripture_filename: String,
  pub attributes: BTreeMap<String, String>,
}

impl ProjectInfo {
  pub fn new(id: impl Into<String>, path: PathBuf, settings: ProjectSettings, created_at: DateTime<Utc>) -> Self {
    let id = id.into();
    Self {
      scripture_filename: format!("{}-{}", settings.iso_code, id),
      id,
      name: settings.name,
      full_name: settings.full_name,
      lang: settings.language,
      iso_code: settings.iso_code,
      path,
      created_at,
      attributes: settings.attributes,
    }
  }
}
