//! 基础设施层
//!
//! 提供模块运行时的具体实现，包括：
//! - 依赖注入容器
//! - 启动流程
//! - 内置模块

// 容器实现
pub mod container;
pub mod boot;
pub mod observer;

// 重新导出API
pub use boot::{BootReport, BootSequencer};
pub use container::{Declaration, Dependencies, Injector, ModuleObject, ModuleReturn};
pub use observer::{HandlerId, Observer, ObserverFactory, OBSERVER_MODULE};
