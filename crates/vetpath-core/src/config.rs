//! Core configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then `VETPATH_*`
//! environment variables (`__` separates nested keys, e.g.
//! `VETPATH_DATABASE__BUSY_TIMEOUT_MS`). The loaded value is passed explicitly
//! to constructors; nothing here is process-global.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DEFAULT_CHANGE_REASON;

const ENV_PREFIX: &str = "VETPATH";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configuration errors.
#[derive(Error, Debug)]
pub enum CoreConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, CoreConfigError>;

/// Complete core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// SQLite file; in-memory when absent
    pub path: Option<PathBuf>,
    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
}

/// Audit history settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Recorded when an update carries no reason
    pub default_change_reason: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// One of error, warn, info, debug, trace
    pub level: String,
    /// Rotating log files go here; stderr when absent
    pub directory: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_change_reason: DEFAULT_CHANGE_REASON.to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl CoreConfig {
    /// Load from defaults, an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_from(
            path,
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
    }

    /// Load with an explicit environment source.
    pub fn load_from(path: Option<&Path>, env: Environment) -> ConfigResult<Self> {
        let defaults = CoreConfig::default();
        let mut builder = Config::builder()
            .set_default(
                "database.busy_timeout_ms",
                defaults.database.busy_timeout_ms as i64,
            )?
            .set_default(
                "history.default_change_reason",
                defaults.history.default_change_reason,
            )?
            .set_default("log.level", defaults.log.level)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: CoreConfig = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.history.default_change_reason.trim().is_empty() {
            return Err(CoreConfigError::Invalid(
                "history.default_change_reason must not be empty".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(CoreConfigError::Invalid(format!(
                "log.level '{}' is not one of {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn empty_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::load_from(None, empty_env()).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.history.default_change_reason, DEFAULT_CHANGE_REASON);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [database]
            path = "/var/lib/vetpath/cases.db"
            busy_timeout_ms = 100

            [log]
            level = "debug"
            "#
        )
        .unwrap();

        let config = CoreConfig::load_from(Some(file.path()), empty_env()).unwrap();
        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/vetpath/cases.db"))
        );
        assert_eq!(config.database.busy_timeout_ms, 100);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.history.default_change_reason, DEFAULT_CHANGE_REASON);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config =
            CoreConfig::load_from(Some(Path::new("/nonexistent/vetpath.toml")), empty_env())
                .unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<String, String> = [
            ("VETPATH_DATABASE__BUSY_TIMEOUT_MS", "42"),
            ("VETPATH_HISTORY__DEFAULT_CHANGE_REASON", "Pathologist amendment"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(Some(vars));

        let config = CoreConfig::load_from(None, env).unwrap();
        assert_eq!(config.database.busy_timeout_ms, 42);
        assert_eq!(
            config.history.default_change_reason,
            "Pathologist amendment"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CoreConfig::default();
        config.history.default_change_reason = "  ".into();
        assert!(matches!(config.validate(), Err(CoreConfigError::Invalid(_))));

        let mut config = CoreConfig::default();
        config.log.level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.log.level = "WARN".into();
        assert!(config.validate().is_ok());
    }
}
