// YAML configuration for the command-line front end

use crate::backend::{FileStorage, Storage};
use crate::sqlite::SqliteStorage;
use crate::stats::UPCOMING_DAYS;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "todostore";
const CONFIG_FILE: &str = "config.yaml";

/// Which storage backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage directory; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
    pub backend: BackendKind,
    /// Width of the upcoming window used by `stats`
    pub upcoming_days: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: BackendKind::default(),
            upcoming_days: UPCOMING_DAYS,
        }
    }
}

impl Config {
    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the default location
    ///
    /// An explicit path must exist. A missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolved storage directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| eyre!("No data directory on this platform; set data_dir in {}", CONFIG_FILE))
    }

    /// Open the configured backend
    pub fn open_storage(&self) -> Result<Box<dyn Storage>> {
        let dir = self.data_dir()?;
        debug!(dir = ?dir, backend = ?self.backend, "Opening storage");

        Ok(match self.backend {
            BackendKind::Json => Box::new(FileStorage::open(&dir)?),
            BackendKind::Sqlite => Box::new(SqliteStorage::open(&dir)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Json);
        assert_eq!(config.upcoming_days, 3);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse("backend: sqlite\n").unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.upcoming_days, 3);
    }

    #[test]
    fn test_parse_full() {
        let config = Config::parse("data_dir: /tmp/todos\nbackend: json\nupcoming_days: 7\n").unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/todos")));
        assert_eq!(config.upcoming_days, 7);
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert!(Config::parse("backend: postgres\n").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "backend: sqlite\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);

        assert!(Config::load(Some(&temp.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_open_storage_backends() {
        let temp = TempDir::new().unwrap();

        let mut config = Config {
            data_dir: Some(temp.path().join("json")),
            ..Default::default()
        };
        let mut storage = config.open_storage().unwrap();
        storage.write("todos", "[]").unwrap();
        assert!(temp.path().join("json/todos.json").exists());

        config.data_dir = Some(temp.path().join("sql"));
        config.backend = BackendKind::Sqlite;
        let _storage = config.open_storage().unwrap();
        assert!(temp.path().join("sql/todostore.db").exists());
    }
}
