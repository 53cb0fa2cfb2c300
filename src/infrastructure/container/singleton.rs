//! 单例包装器
//!
//! 每个注册的模块对应一个 `Singleton`：持有规范化后的构造器，
//! 首次解析时构造实例并缓存，之后始终返回同一个对象。
//! 依赖的遍历由注入器的工作栈驱动，这里只负责单个模块的状态转换。

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use super::injectable::{Dependencies, Injectable};
use super::injector::{InnerStats, ResolutionContext};
use super::module_object::{ModuleObject, ModuleReturn};
use crate::errors::{InjectorError, Result};

/// 单例状态
enum SlotState {
    /// 尚未构造（或上一次构造失败）
    Pending,
    /// 正在构造，再次进入即为循环依赖
    Constructing,
    Ready(Arc<ModuleObject>),
}

/// 单例模块
pub struct Singleton {
    name: String,
    constructor: Injectable<ModuleReturn>,
    load_on_startup: bool,
    state: Mutex<SlotState>,
}

impl Singleton {
    pub(crate) fn new(
        name: String,
        constructor: Injectable<ModuleReturn>,
        load_on_startup: bool,
    ) -> Self {
        Self {
            name,
            constructor,
            load_on_startup,
            state: Mutex::new(SlotState::Pending),
        }
    }

    /// 创建时即已实例化的模块（`$injector`）
    pub(crate) fn ready(name: String, constructor: Injectable<ModuleReturn>, object: ModuleObject) -> Self {
        Self {
            name,
            constructor,
            load_on_startup: false,
            state: Mutex::new(SlotState::Ready(Arc::new(object))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load_on_startup(&self) -> bool {
        self.load_on_startup
    }

    /// 构造器声明的依赖
    pub fn dependencies(&self) -> &[String] {
        self.constructor.dependencies()
    }

    pub fn is_instantiated(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Ready(_))
    }

    /// 已构造的实例，不触发构造
    pub fn instance(&self) -> Option<Arc<ModuleObject>> {
        match &*self.state.lock() {
            SlotState::Ready(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }

    /// 开始构造前的检查
    ///
    /// 已缓存则直接返回实例；未构造则标记为构造中并计入解析链。
    /// 遇到正在构造的模块即为循环依赖。
    pub(crate) fn claim(&self, stats: &InnerStats, ctx: &mut ResolutionContext) -> Result<Claim> {
        let mut state = self.state.lock();
        match &*state {
            SlotState::Ready(object) => {
                stats.record_hit();
                Ok(Claim::Ready(Arc::clone(object)))
            }
            SlotState::Constructing => Err(InjectorError::DependencyCycle {
                chain: ctx.cycle_chain(&self.name),
            }),
            SlotState::Pending => {
                ctx.enter(&self.name)?;
                *state = SlotState::Constructing;
                Ok(Claim::Claimed)
            }
        }
    }

    /// 用已解析的依赖调用构造函数并缓存结果
    ///
    /// 状态锁不会跨越工厂调用持有；失败时回到 `Pending`。
    pub(crate) fn complete(&self, deps: &Dependencies, stats: &InnerStats) -> Result<Arc<ModuleObject>> {
        tracing::debug!(module = %self.name, dependencies = deps.len(), "Instantiating module");
        let result = self
            .constructor
            .invoke(&self.name, deps)
            .and_then(|value| value.into_object(&self.name));

        let mut state = self.state.lock();
        match result {
            Ok(object) => {
                let object = Arc::new(object);
                *state = SlotState::Ready(Arc::clone(&object));
                stats.record_instantiation();
                Ok(object)
            }
            Err(error) => {
                *state = SlotState::Pending;
                Err(error)
            }
        }
    }

    /// 放弃尚未完成的构造
    pub(crate) fn abandon(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Constructing) {
            *state = SlotState::Pending;
        }
    }
}

/// `claim` 的结果
pub(crate) enum Claim {
    /// 已有缓存实例
    Ready(Arc<ModuleObject>),
    /// 由调用方负责完成构造
    Claimed,
}

impl fmt::Debug for Singleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton")
            .field("name", &self.name)
            .field("dependencies", &self.constructor.dependencies())
            .field("load_on_startup", &self.load_on_startup)
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}
