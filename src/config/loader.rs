//! Configuration loading from files and environment variables.
//!
//! Resolution order: built-in defaults, then an optional config file
//! (`REMEDY_CONFIG_PATH` or `config/remedy.{yaml,toml,json}`), then
//! `REMEDY_`-prefixed environment variables (`REMEDY_SCHEDULER__MAX_CONCURRENT_TASKS=8`).

use super::RemedyConfig;
use config::{Config, Environment, File};
use tracing::{debug, info};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl RemedyConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self, ConfigurationError> {
        let path = std::env::var("REMEDY_CONFIG_PATH")
            .unwrap_or_else(|_| "config/remedy".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit file path (extension optional),
    /// still applying environment overrides
    pub fn load_from(path: &str) -> Result<Self, ConfigurationError> {
        debug!(config_path = %path, "Loading configuration");

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("REMEDY").separator("__"))
            .build()?;

        let config: RemedyConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            max_concurrent_tasks = config.scheduler.max_concurrent_tasks,
            policy = %config.scheduler.policy.name,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "Configuration loaded"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = RemedyConfig::load_from("/nonexistent/remedy-config").unwrap();
        assert_eq!(config.scheduler.max_concurrent_tasks, 4);
        assert_eq!(config.reactor.action_timeout_seconds, 10);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remedy.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "scheduler:\n  max_concurrent_tasks: 16\n  policy:\n    name: priority\nreactor:\n  action_timeout_seconds: 5"
        )
        .unwrap();

        let config = RemedyConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.scheduler.max_concurrent_tasks, 16);
        assert_eq!(config.scheduler.policy.name, "priority");
        assert_eq!(config.reactor.action_timeout_seconds, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remedy.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "scheduler:\n  max_concurrent_tasks: 0").unwrap();

        let result = RemedyConfig::load_from(path.to_str().unwrap());
        assert!(matches!(
            result,
            Err(ConfigurationError::Invalid { .. })
        ));
    }
}
