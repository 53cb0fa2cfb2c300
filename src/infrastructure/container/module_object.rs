//! 模块实例与构造结果
//!
//! 构造函数必须产出一个 `ModuleObject`；生命周期钩子作为能力挂在对象上，
//! 启动流程按阶段查询。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::injectable::Declaration;
use crate::errors::{InjectorError, Result};

/// 类型擦除的模块实例
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// 实例的具体类型名称
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 安全的向下转型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// 向下转型，失败时报告依赖名称和两侧类型
    pub(crate) fn downcast_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.downcast::<T>()
            .ok_or_else(|| InjectorError::DependencyTypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
                actual: self.type_name,
            })
    }

    /// 两个句柄是否指向同一个实例
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// 启动阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Init,
    Build,
    Final,
}

impl LifecyclePhase {
    /// 按执行顺序排列的全部阶段
    pub const ALL: [LifecyclePhase; 3] = [
        LifecyclePhase::Init,
        LifecyclePhase::Build,
        LifecyclePhase::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Init => "$init",
            LifecyclePhase::Build => "$build",
            LifecyclePhase::Final => "$final",
        }
    }

    fn slot(self) -> usize {
        match self {
            LifecyclePhase::Init => 0,
            LifecyclePhase::Build => 1,
            LifecyclePhase::Final => 2,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 构造函数产出的模块对象
#[derive(Clone)]
pub struct ModuleObject {
    instance: Instance,
    hooks: [Option<Declaration<()>>; 3],
}

impl ModuleObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_instance(Instance::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::from_instance(Instance::from_arc(value))
    }

    pub fn from_instance(instance: Instance) -> Self {
        Self {
            instance,
            hooks: [None, None, None],
        }
    }

    /// 没有状态、只承载钩子的模块
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn on_init(self, hook: Declaration<()>) -> Self {
        self.with_hook(LifecyclePhase::Init, hook)
    }

    pub fn on_build(self, hook: Declaration<()>) -> Self {
        self.with_hook(LifecyclePhase::Build, hook)
    }

    pub fn on_final(self, hook: Declaration<()>) -> Self {
        self.with_hook(LifecyclePhase::Final, hook)
    }

    pub fn with_hook(mut self, phase: LifecyclePhase, hook: Declaration<()>) -> Self {
        self.hooks[phase.slot()] = Some(hook);
        self
    }

    pub fn hook(&self, phase: LifecyclePhase) -> Option<&Declaration<()>> {
        self.hooks[phase.slot()].as_ref()
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.downcast::<T>()
    }
}

impl fmt::Debug for ModuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<&str> = LifecyclePhase::ALL
            .iter()
            .filter(|phase| self.hook(**phase).is_some())
            .map(|phase| phase.as_str())
            .collect();
        f.debug_struct("ModuleObject")
            .field("type_name", &self.instance.type_name())
            .field("hooks", &hooks)
            .finish()
    }
}

/// 构造函数的返回值
///
/// 只有 `Object` 是合法的模块；其余情况在首次解析时报 `InvalidModuleReturn`。
#[derive(Debug)]
pub enum ModuleReturn {
    Object(ModuleObject),
    Primitive(&'static str),
    Nothing,
}

impl ModuleReturn {
    /// 返回值形状，用于错误信息
    pub fn kind(&self) -> &'static str {
        match self {
            ModuleReturn::Object(_) => "object",
            ModuleReturn::Primitive(kind) => *kind,
            ModuleReturn::Nothing => "nothing",
        }
    }

    pub(crate) fn into_object(self, module: &str) -> Result<ModuleObject> {
        match self {
            ModuleReturn::Object(object) => Ok(object),
            other => Err(InjectorError::InvalidModuleReturn {
                module: module.to_string(),
                found: other.kind(),
            }),
        }
    }
}

impl From<ModuleObject> for ModuleReturn {
    fn from(object: ModuleObject) -> Self {
        ModuleReturn::Object(object)
    }
}

impl From<Option<ModuleObject>> for ModuleReturn {
    fn from(object: Option<ModuleObject>) -> Self {
        object.map_or(ModuleReturn::Nothing, ModuleReturn::Object)
    }
}

impl From<()> for ModuleReturn {
    fn from(_: ()) -> Self {
        ModuleReturn::Nothing
    }
}

macro_rules! primitive_return {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for ModuleReturn {
                fn from(_: $ty) -> Self {
                    ModuleReturn::Primitive($kind)
                }
            }
        )+
    };
}

primitive_return!("boolean" => bool);
primitive_return!("number" => i32, i64, u32, u64, usize, f64);
primitive_return!("string" => String, &'static str);
