use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};

use crate::errors::ConfigError;
use crate::logging::{LogFormat, LoggingConfig, LoggingEnvironment};

use super::loader::ConfigLoader;

// Configuration paths
pub const USER_CONFIG_PATH: &str = "~/.config/bambo";
pub const CONFIG_FILE_NAME: &str = "config.toml";

// Environment overrides
pub const ENV_MAX_DEPTH: &str = "BAMBO_MAX_DEPTH";
pub const ENV_LOG_LEVEL: &str = "BAMBO_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "BAMBO_LOG_FORMAT";

/// Default nesting ceiling for module instantiation
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Injector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Maximum depth of nested module instantiation
    pub max_depth: usize,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Logging settings as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub environment: String,
    pub level: String,
    pub format: String,
    pub show_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            level: "info".to_string(),
            format: "pretty".to_string(),
            show_target: true,
        }
    }
}

impl LoggingSettings {
    /// Convert into the logging subsystem configuration
    pub fn to_logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        let environment: LoggingEnvironment = self
            .environment
            .parse()
            .map_err(|e: String| ConfigError::FieldInvalid("logging.environment".to_string(), e))?;
        let level: tracing::Level = self.level.parse().map_err(|_| {
            ConfigError::FieldInvalid(
                "logging.level".to_string(),
                format!("unknown level '{}'", self.level),
            )
        })?;
        let format: LogFormat = self
            .format
            .parse()
            .map_err(|e: String| ConfigError::FieldInvalid("logging.format".to_string(), e))?;

        Ok(LoggingConfig {
            level,
            format,
            show_target: self.show_target,
            ..LoggingConfig::for_environment(environment)
        })
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub injector: InjectorConfig,
    pub logging: LoggingSettings,
}

/// Partial runtime configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialRuntimeConfig {
    injector: Option<InjectorConfig>,
    logging: Option<LoggingSettings>,
}

impl RuntimeConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load_config()
    }

    /// Load configuration with custom base path (for testing)
    pub fn load_with_base_path(base_path: PathBuf) -> Result<Self, ConfigError> {
        ConfigLoader::with_base_path(base_path).load_config()
    }

    /// Create RuntimeConfig from partial config and environment
    pub fn from_partial_and_env(
        partial: Option<PartialRuntimeConfig>,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();
        let mut config = RuntimeConfig {
            injector: partial.injector.unwrap_or_default(),
            logging: partial.logging.unwrap_or_default(),
        };

        if let Some(value) = env_map.get(ENV_MAX_DEPTH) {
            config.injector.max_depth = value.trim().parse().map_err(|_| {
                ConfigError::FieldInvalid(
                    ENV_MAX_DEPTH.to_string(),
                    format!("'{}' is not a positive integer", value),
                )
            })?;
        }
        if let Some(value) = env_map.get(ENV_LOG_LEVEL) {
            config.logging.level = value.trim().to_lowercase();
        }
        if let Some(value) = env_map.get(ENV_LOG_FORMAT) {
            config.logging.format = value.trim().to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.injector.max_depth == 0 {
            return Err(ConfigError::FieldInvalid(
                "injector.max_depth".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        self.logging.to_logging_config()?;
        Ok(())
    }
}
