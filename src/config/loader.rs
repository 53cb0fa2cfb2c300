use std::{collections::HashMap, env, fs, path::{Path, PathBuf}};

use crate::errors::ConfigError;

use super::app_config::{
    PartialRuntimeConfig, RuntimeConfig, CONFIG_FILE_NAME, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_MAX_DEPTH, USER_CONFIG_PATH,
};

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default paths
    pub fn new() -> Self {
        Self {
            base_path: None,
            config_path: None,
        }
    }

    /// Create a config loader with custom base path (for testing)
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
            config_path: None,
        }
    }

    /// Create a config loader reading an explicit file; the file must exist
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self {
            base_path: None,
            config_path: Some(config_path),
        }
    }

    /// Load complete runtime configuration
    pub fn load_config(&self) -> Result<RuntimeConfig, ConfigError> {
        let partial = match &self.config_path {
            Some(path) => Some(self.read_partial_config(path)?),
            None => {
                let path = self.extract_file_path(USER_CONFIG_PATH, CONFIG_FILE_NAME);
                if path.exists() {
                    Some(self.read_partial_config(&path)?)
                } else {
                    tracing::info!("配置文件 {:?} 不存在，使用默认配置", path);
                    None
                }
            }
        };

        RuntimeConfig::from_partial_and_env(partial, self.collect_env_vars())
    }

    /// Path of the config file this loader reads
    pub fn config_file_path(&self) -> PathBuf {
        match &self.config_path {
            Some(path) => path.clone(),
            None => self.extract_file_path(USER_CONFIG_PATH, CONFIG_FILE_NAME),
        }
    }

    /// Extract file path with tilde expansion and base path override
    fn extract_file_path(&self, base_dir: &str, file_name: &str) -> PathBuf {
        let expanded_base = if let Some(base_path) = &self.base_path {
            // For testing: use custom base path
            base_path.join(base_dir.trim_start_matches("~/"))
        } else {
            let expanded = shellexpand::tilde(base_dir);
            PathBuf::from(expanded.as_ref())
        };

        expanded_base.join(file_name)
    }

    /// Load partial configuration from TOML file
    fn read_partial_config(&self, config_path: &Path) -> Result<PartialRuntimeConfig, ConfigError> {
        let shown = config_path.to_string_lossy().to_string();
        let content = fs::read_to_string(config_path)
            .map_err(|e| ConfigError::FileRead(shown.clone(), e))?;

        let partial = toml::from_str(&content).map_err(|e| ConfigError::TomlParse(shown.clone(), e))?;
        tracing::debug!("已加载配置文件: {}", shown);
        Ok(partial)
    }

    /// Collect relevant environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let env_keys = [ENV_MAX_DEPTH, ENV_LOG_LEVEL, ENV_LOG_FORMAT];

        let mut env_map = HashMap::new();
        for key in &env_keys {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
