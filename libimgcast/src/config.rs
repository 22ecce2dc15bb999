//! Configuration management for Imgcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::caption::DEFAULT_HASHTAG_RUN;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/imgcast/schedule.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Caption limit applied to token-based instances (Mastodon)
    pub max_length: usize,
    /// Consecutive hashtag words that start the trailing hashtag block
    ///
    /// The block always begins at the first word of the run. With the default
    /// of 2 that is the word before the one completing the run; larger values
    /// keep every word of the run in the block rather than only the last two.
    pub hashtag_run: usize,
    pub filters: Vec<CaptionFilter>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_length: 500,
            hashtag_run: DEFAULT_HASHTAG_RUN,
            filters: vec![CaptionFilter {
                from: "@fizzblizz".to_string(),
                to: "@Fizzblizz".to_string(),
            }],
        }
    }
}

/// Literal substring replacement applied to caption bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionFilter {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    /// PDS base URL used for sessions, blob uploads and record creation
    pub service: String,
    pub max_length: usize,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            max_length: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds between sweeps when running as a daemon
    pub poll_interval: u64,
    /// Per-request deadline in seconds for platform calls; unset means no deadline
    pub request_timeout: Option<u64>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            request_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file yields the built-in defaults. `IMGCAST_DB_PATH`
    /// overrides the database path either way.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Self::default_config()
        };

        if let Ok(db_path) = std::env::var("IMGCAST_DB_PATH") {
            config.database.path = db_path;
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("IMGCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("imgcast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default_config();
        assert_eq!(config.caption.max_length, 500);
        assert_eq!(config.caption.hashtag_run, 2);
        assert_eq!(config.caption.filters.len(), 1);
        assert_eq!(config.bluesky.service, "https://bsky.social");
        assert_eq!(config.bluesky.max_length, 300);
        assert_eq!(config.scheduling.poll_interval, 60);
        assert!(config.scheduling.request_timeout.is_none());
    }

    #[test]
    fn test_load_from_path_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[database]
path = "/tmp/imgcast-test.db"

[caption]
max_length = 280

[[caption.filters]]
from = "@old"
to = "@new"

[scheduling]
request_timeout = 15
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/imgcast-test.db");
        assert_eq!(config.caption.max_length, 280);
        assert_eq!(config.caption.hashtag_run, 2);
        assert_eq!(
            config.caption.filters,
            vec![CaptionFilter {
                from: "@old".to_string(),
                to: "@new".to_string()
            }]
        );
        assert_eq!(config.scheduling.request_timeout, Some(15));
        assert_eq!(config.scheduling.poll_interval, 60);
        assert_eq!(config.bluesky.service, "https://bsky.social");
    }

    #[test]
    fn test_load_from_path_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[database\npath = ").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults_with_db_override() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("IMGCAST_CONFIG", temp_dir.path().join("absent.toml"));
        std::env::set_var("IMGCAST_DB_PATH", "/tmp/override.db");

        let config = Config::load().unwrap();

        std::env::remove_var("IMGCAST_CONFIG");
        std::env::remove_var("IMGCAST_DB_PATH");

        assert_eq!(config.database.path, "/tmp/override.db");
        assert_eq!(config.caption.max_length, 500);
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("IMGCAST_CONFIG", "/etc/imgcast/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("IMGCAST_CONFIG");

        assert_eq!(path, PathBuf::from("/etc/imgcast/config.toml"));
    }
}
