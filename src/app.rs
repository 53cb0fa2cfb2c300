//! 模块运行时门面
//!
//! `Bambo` 持有一个注入器和启动状态，内置 `$observer` 模块在创建时预置。

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

use crate::config::{InjectorConfig, RuntimeConfig};
use crate::errors::{InjectorError, Result};
use crate::infrastructure::boot::{BootReport, BootSequencer};
use crate::infrastructure::container::{Declaration, Injector, ModuleReturn};
use crate::infrastructure::observer::{ObserverFactory, OBSERVER_MODULE};

/// 启动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// 未启动
    NotStarted,
    /// 启动中
    Running,
    /// 已完成
    Completed,
    /// 启动失败
    Failed,
}

/// Bambo 应用程序
///
/// 封装一个注入器：链式注册模块，然后执行一次启动流程。
pub struct Bambo {
    injector: Injector,
    state: Mutex<BootState>,
}

impl Default for Bambo {
    fn default() -> Self {
        Self::new()
    }
}

impl Bambo {
    /// 创建新的应用程序实例
    pub fn new() -> Self {
        Self::with_injector_config(&InjectorConfig::default())
    }

    /// 使用运行时配置创建
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self::with_injector_config(&config.injector)
    }

    fn with_injector_config(config: &InjectorConfig) -> Self {
        let injector =
            Injector::with_builtins(config, [(OBSERVER_MODULE, ObserverFactory::injectable())]);
        Self {
            injector,
            state: Mutex::new(BootState::NotStarted),
        }
    }

    /// 注册启动时加载的模块
    pub fn module(&self, name: &str, constructor: Declaration<ModuleReturn>) -> Result<&Self> {
        self.module_with(name, constructor, true)
    }

    /// 注册延迟加载的模块
    pub fn lazy_module(&self, name: &str, constructor: Declaration<ModuleReturn>) -> Result<&Self> {
        self.module_with(name, constructor, false)
    }

    /// 注册模块并指定是否在启动时加载
    pub fn module_with(
        &self,
        name: &str,
        constructor: Declaration<ModuleReturn>,
        load_on_startup: bool,
    ) -> Result<&Self> {
        self.injector.register(name, constructor, load_on_startup)?;
        Ok(self)
    }

    /// 执行启动流程，只能调用一次
    ///
    /// 重复调用、在钩子中调用、或上一次启动失败后再调用，都返回 `AlreadyBooted`。
    pub fn boot(&self) -> Result<BootReport> {
        {
            let mut state = self.state.lock();
            if *state != BootState::NotStarted {
                return Err(InjectorError::AlreadyBooted);
            }
            *state = BootState::Running;
        }

        tracing::info!(modules = self.injector.len(), "Booting application");
        let result = BootSequencer::new(&self.injector).run();

        let mut state = self.state.lock();
        match &result {
            Ok(_) => *state = BootState::Completed,
            Err(error) => {
                tracing::warn!(%error, "Boot sequence failed");
                *state = BootState::Failed;
            }
        }
        result
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// 解析模块并向下转型
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.injector.get(name)
    }

    pub fn state(&self) -> BootState {
        *self.state.lock()
    }

    pub fn is_booted(&self) -> bool {
        self.state() == BootState::Completed
    }
}
