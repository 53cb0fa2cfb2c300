pub mod app;
pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;
pub mod manifest;
pub mod utils;

// Re-export commonly used items for convenience
pub use app::{Bambo, BootState};
pub use config::RuntimeConfig;
pub use errors::{InjectorError, Result};
pub use infrastructure::container::{
    Declaration, Dependencies, ExternalDependencies, Injector, InjectorHandle, LifecyclePhase,
    ModuleObject, ModuleReturn,
};
pub use infrastructure::BootReport;
