//! Container module
//!
//! 模块注入器及其组成部分：依赖声明、模块对象、单例包装器。

pub mod injectable;
pub mod injector;
pub mod module_object;
pub mod singleton;

// Re-export primary types
pub use injectable::{Declaration, Dependencies, Element, Factory, Injectable};
pub use injector::{
    ExternalDependencies, Injector, InjectorHandle, InjectorStats, ModuleRef, INJECTOR_MODULE,
};
pub use module_object::{Instance, LifecyclePhase, ModuleObject, ModuleReturn};
pub use singleton::Singleton;
