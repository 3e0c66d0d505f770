// Configuration management for Pipeliner

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::session::DEFAULT_FALLBACK_PIPELINE;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Pipeline built when no custom description is pending
    #[serde(default = "default_fallback_pipeline")]
    pub fallback_pipeline: String,

    /// Custom pipeline description applied at startup (if any)
    #[serde(default)]
    pub pipeline: Option<String>,

    /// Whether to request PLAYING as soon as each pipeline is up
    #[serde(default = "default_true")]
    pub auto_play: bool,

    /// How often the host polls the error slot
    #[serde(default = "default_error_poll_interval_ms")]
    pub error_poll_interval_ms: u64,

    /// Where the saved pipeline library lives
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Optional directory for per-pipeline `.gstpipe` backups
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_pipeline: default_fallback_pipeline(),
            pipeline: None,
            auto_play: true,
            error_poll_interval_ms: default_error_poll_interval_ms(),
            library_dir: default_library_dir(),
            backup_dir: None,
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        log::warn!("Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    pub fn error_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.error_poll_interval_ms.max(1))
    }
}

fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pipeliner")
}

/// Get the config file path
pub fn default_config_path() -> PathBuf {
    app_config_dir().join("config.toml")
}

fn default_library_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("pipeliner"))
        .unwrap_or_else(app_config_dir)
}

fn default_fallback_pipeline() -> String {
    DEFAULT_FALLBACK_PIPELINE.to_string()
}

/// Default poll interval (for serde)
fn default_error_poll_interval_ms() -> u64 {
    500
}

/// Default true value (for serde)
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.error_poll_interval_ms, 500);
        assert!(config.auto_play);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pipeline = \"videotestsrc ! fakesink\"\nauto_play = false\n").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.pipeline.as_deref(), Some("videotestsrc ! fakesink"));
        assert!(!config.auto_play);
        assert_eq!(config.fallback_pipeline, DEFAULT_FALLBACK_PIPELINE);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            backup_dir: Some(dir.path().join("backups")),
            error_poll_interval_ms: 250,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load_or_default(&path), config);
    }

    #[test]
    fn unparsable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_play = \"sometimes\"").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
