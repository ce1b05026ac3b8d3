//! Configuration for the `tq` binary

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scheduler::SchedulerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Default config locations, most specific last
    fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("taskqueue").join("config.yml")),
            Some(PathBuf::from("taskqueue.yml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load config from file, or use defaults
    ///
    /// An explicit path must exist; otherwise the first default location that
    /// exists is used.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!(path = %config_path.display(), "Config::load: explicit path");
            return Self::load_from(config_path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                debug!(path = %path.display(), "Config::load: found default config");
                return Self::load_from(&path);
            }
        }

        debug!("Config::load: no config file, using defaults");
        Ok(Config::default())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .scheduler
            .validate()
            .with_context(|| format!("Invalid scheduler settings in {}", path.display()))?;
        Ok(config)
    }

    /// Read only the log level, ignoring any other problem with the file
    ///
    /// Used before logging is initialised, so failures stay silent.
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        Self::load(path).ok().and_then(|config| config.log_level)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "log_level: debug\nscheduler:\n  max_concurrency: 4\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.scheduler.max_concurrency, 4);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_invalid_concurrency_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "scheduler:\n  max_concurrency: 0\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("max_concurrency"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.yml");
        let config = Config {
            log_level: Some("warn".to_string()),
            scheduler: SchedulerConfig::with_max_concurrency(7),
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }
}
