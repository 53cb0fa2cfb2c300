pub mod app_config;
pub mod loader;

// Re-export commonly used types
pub use app_config::{InjectorConfig, LoggingSettings, RuntimeConfig};
pub use loader::ConfigLoader;

// Re-export constants
pub use app_config::{
    CONFIG_FILE_NAME, DEFAULT_MAX_DEPTH, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_MAX_DEPTH,
    USER_CONFIG_PATH,
};
