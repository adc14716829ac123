//! Configuration file support for voicetally.
//!
//! Loads configuration from `voicetally.toml` in the working directory, or
//! from the path given with `--config`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use voicetally_core::JsonFileStore;
use voicetally_logging::LogFormat;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "voicetally.toml";

pub const DEFAULT_BIND: &str = "127.0.0.1:7878";
pub const DEFAULT_RESET_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_TOP_SIZE: usize = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings loaded from `voicetally.toml`. Every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Where accumulated time is persisted
    pub data_file: Option<PathBuf>,
    /// Address the HTTP API listens on
    pub bind: Option<String>,
    /// How often the tally is wiped (e.g. "24h")
    #[serde(default, with = "humantime_serde")]
    pub reset_period: Option<Duration>,
    /// How often totals are saved while running (disabled when absent)
    #[serde(default, with = "humantime_serde")]
    pub autosave_period: Option<Duration>,
    /// Default leaderboard length
    pub top_size: Option<usize>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    /// Directory for the daily-rolling JSON log file
    pub log_dir: Option<PathBuf>,
}

impl TallyConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        Self::load_from(&config_path).map(Some)
    }

    /// Load configuration from an explicit path. A missing file is an error.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: TallyConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", config_path.display()))?;

        Ok(config)
    }

    /// Timer periods must be non-zero.
    fn validate(&self) -> Result<()> {
        if self.reset_period.is_some_and(|p| p.is_zero()) {
            bail!("reset_period must be greater than zero");
        }
        if self.autosave_period.is_some_and(|p| p.is_zero()) {
            bail!("autosave_period must be greater than zero");
        }
        Ok(())
    }

    /// Explicit path if given, otherwise `voicetally.toml` in `working_dir` if present.
    pub fn discover(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Ok(Self::load(working_dir)?.unwrap_or_default()),
        }
    }

    pub fn data_file(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(JsonFileStore::default_path)
    }

    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn reset_period(&self) -> Duration {
        self.reset_period.unwrap_or(DEFAULT_RESET_PERIOD)
    }

    pub fn top_size(&self) -> usize {
        self.top_size.unwrap_or(DEFAULT_TOP_SIZE)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        match self.log_format.as_deref() {
            Some(s) => s.parse().map_err(anyhow::Error::msg),
            None => Ok(LogFormat::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(TallyConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_defaults() {
        let config = TallyConfig::default();

        assert_eq!(config.bind(), DEFAULT_BIND);
        assert_eq!(config.reset_period(), Duration::from_secs(86_400));
        assert_eq!(config.top_size(), 5);
        assert_eq!(config.log_format().unwrap(), LogFormat::Pretty);
        assert!(config.autosave_period.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
data_file = "/tmp/voice.json"
bind = "0.0.0.0:9000"
reset_period = "12h"
autosave_period = "15m"
top_size = 10
log_level = "debug"
log_format = "json"
"#,
        )
        .unwrap();

        let config = TallyConfig::load(dir.path()).unwrap().unwrap();

        assert_eq!(config.data_file(), PathBuf::from("/tmp/voice.json"));
        assert_eq!(config.bind(), "0.0.0.0:9000");
        assert_eq!(config.reset_period(), Duration::from_secs(12 * 3600));
        assert_eq!(config.autosave_period, Some(Duration::from_secs(15 * 60)));
        assert_eq!(config.top_size(), 10);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_format().unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "colour = \"blurple\"\n").unwrap();

        assert!(TallyConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_zero_reset_period_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "reset_period = \"0s\"\n").unwrap();

        let err = TallyConfig::load(dir.path()).unwrap_err();

        assert!(format!("{err:#}").contains("reset_period must be greater than zero"));
    }

    #[test]
    fn test_zero_autosave_period_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "autosave_period = \"0s\"\n").unwrap();

        let err = TallyConfig::load(dir.path()).unwrap_err();

        assert!(format!("{err:#}").contains("autosave_period must be greater than zero"));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(TallyConfig::discover(Some(&missing), dir.path()).is_err());
    }
}
