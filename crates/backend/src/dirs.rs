use std::path::{Path, PathBuf};

/// Get the default config directory
///
/// Respects the following environment variables (in order of precedence):
/// 1. CONFIG_DIR - explicit config directory override
/// 2. XDG_CONFIG_HOME - standard XDG config home directory
/// 3. dirs::config_dir() - platform default
pub fn default_config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("CONFIG_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return PathBuf::from(xdg_config).join("silauto");
  }

  dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("silauto")
}

/// Default SILNLP data root (`~/silnlp_data`).
pub fn default_silnlp_data() -> PathBuf {
  expand_home(Path::new("~/silnlp_data"))
}

/// Expand a leading `~` to the home directory.
///
/// Absolute paths and paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
  if path.is_absolute() {
    return path.to_path_buf();
  }

  let Ok(rest) = path.strip_prefix("~") else {
    return path.to_path_buf();
  };

  match dirs::home_dir() {
    Some(home) => home.join(rest),
    None => path.to_path_buf(),
  }
}
