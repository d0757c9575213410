use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the runtime config inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// File name of the default SQLite database inside the data directory.
const DATABASE_FILE_NAME: &str = "lifecycle.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Runtime settings for the lifecycle engine and CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
  /// SQLite connection URL. Defaults to a database file in the data directory.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,

  /// Subject id recorded in audit fields (created-by / modified-by).
  #[serde(default)]
  pub actor_id: i64,

  /// Registered predicates that must not resolve.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub disabled_predicates: Vec<String>,

  /// Registered effects that must not resolve.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub disabled_effects: Vec<String>,
}

impl LifecycleConfig {
  /// Load `config.json` from the data directory.
  ///
  /// A missing file yields the default config.
  pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    let content = match std::fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(ConfigError::Read { path, source }),
    };

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
  }

  /// The database URL to connect to, falling back to `<data_dir>/lifecycle.db`.
  pub fn database_url(&self, data_dir: &Path) -> String {
    match &self.database_url {
      Some(url) => url.clone(),
      None => format!("sqlite://{}", data_dir.join(DATABASE_FILE_NAME).display()),
    }
  }
}
