//! 模块注入器
//!
//! 维护按注册顺序排列的模块表，负责注册、递归解析、循环检测和统计。
//! 注入器是显式创建的实例，不存在全局注册表；自身以 `$injector` 名称注册。

use parking_lot::{ReentrantMutex, RwLock};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::injectable::{Declaration, Dependencies, Factory, Injectable};
use super::module_object::{Instance, LifecyclePhase, ModuleObject, ModuleReturn};
use super::singleton::{Claim, Singleton};
use crate::config::InjectorConfig;
use crate::errors::{InjectorError, Result};

/// 注入器自身的模块名
pub const INJECTOR_MODULE: &str = "$injector";

/// 一次性 `resolve` 调用在错误信息中的名称
const ANONYMOUS_OWNER: &str = "<resolve>";

/// 模块表中的条目
pub type ModuleRef = Arc<Singleton>;

/// 依赖查找方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// 未实例化的模块会被递归构造
    Lazy,
    /// 只接受已经实例化的模块（生命周期钩子）
    InstantiatedOnly,
}

/// 当前线程上正在构造的模块链
///
/// 由解析闸门持有，经 `$injector` 发起的嵌套解析沿用同一条链，
/// 循环报告和深度上限因此跨越嵌套调用保持连续。
pub(crate) struct ResolutionContext {
    chain: Vec<String>,
    max_depth: usize,
}

impl ResolutionContext {
    fn new(max_depth: usize) -> Self {
        Self {
            chain: Vec::new(),
            max_depth,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.chain.len()
    }

    /// 进入一层构造；超过深度上限时失败
    pub(crate) fn enter(&mut self, module: &str) -> Result<()> {
        if self.chain.len() >= self.max_depth {
            return Err(InjectorError::DepthLimitExceeded {
                module: module.to_string(),
                limit: self.max_depth,
            });
        }
        self.chain.push(module.to_string());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.chain.pop();
    }

    /// 回退到进入某次解析之前的长度
    fn truncate(&mut self, depth: usize) {
        self.chain.truncate(depth);
    }

    /// 从首次出现的位置截取循环链，并以重新进入的模块结尾
    pub(crate) fn cycle_chain(&self, module: &str) -> Vec<String> {
        let start = self
            .chain
            .iter()
            .position(|name| name == module)
            .unwrap_or(0);
        let mut chain = self.chain[start..].to_vec();
        chain.push(module.to_string());
        chain
    }
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
pub(crate) struct InnerStats {
    registrations: AtomicUsize,
    resolutions: AtomicUsize,
    instantiations: AtomicUsize,
    cache_hits: AtomicUsize,
    failures: AtomicUsize,
}

impl InnerStats {
    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_instantiation(&self) {
        self.instantiations.fetch_add(1, Ordering::Relaxed);
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn snapshot(&self) -> InjectorStats {
        InjectorStats {
            registrations: self.registrations.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            instantiations: self.instantiations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// 注入器统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    /// 成功注册的模块数（不含 `$injector`）
    pub registrations: usize,
    /// 顶层解析调用次数
    pub resolutions: usize,
    /// 构造函数成功执行次数
    pub instantiations: usize,
    /// 命中已缓存实例的次数
    pub cache_hits: usize,
    /// 失败的顶层解析次数
    pub failures: usize,
}

impl InjectorStats {
    /// 单例查找的缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.instantiations;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    pub fn performance_summary(&self) -> String {
        format!(
            "modules: {}, resolutions: {}, instantiations: {}, cache hits: {} ({:.1}%), failures: {}",
            self.registrations,
            self.resolutions,
            self.instantiations,
            self.cache_hits,
            self.hit_rate() * 100.0,
            self.failures
        )
    }
}

/// 调用方提供的外部依赖，在内部模块表之后查找
#[derive(Debug, Default, Clone)]
pub struct ExternalDependencies {
    values: HashMap<String, Instance>,
}

impl ExternalDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, name: &str, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        self.insert_instance(name, Instance::new(value));
    }

    pub fn insert_instance(&mut self, name: &str, instance: Instance) {
        self.values.insert(name.to_string(), instance);
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 按注册顺序排列的模块表
#[derive(Default)]
struct Registry {
    order: Vec<ModuleRef>,
    index: HashMap<String, usize>,
}

impl Registry {
    fn push(&mut self, module: ModuleRef) {
        self.index.insert(module.name().to_string(), self.order.len());
        self.order.push(module);
    }

    fn get(&self, name: &str) -> Option<ModuleRef> {
        self.index.get(name).map(|&index| Arc::clone(&self.order[index]))
    }
}

type ContextCell = RefCell<ResolutionContext>;

/// 工作栈中的一层：正在构造的模块及其已解析的依赖
struct Frame {
    module: ModuleRef,
    resolved: Vec<(String, Instance)>,
}

/// 一次构造过程；提前返回或工厂 panic 时撤销未完成的模块
struct Construction<'a> {
    ctx: &'a ContextCell,
    base: usize,
    stack: Vec<Frame>,
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        for frame in &self.stack {
            frame.module.abandon();
        }
        if let Ok(mut ctx) = self.ctx.try_borrow_mut() {
            ctx.truncate(self.base);
        }
    }
}

pub(crate) struct InjectorInner {
    registry: RwLock<Registry>,
    /// 串行化所有解析；同一线程内可重入（工厂通过 `$injector` 嵌套解析）
    gate: ReentrantMutex<ContextCell>,
    max_depth: usize,
    pub(crate) stats: InnerStats,
}

impl InjectorInner {
    fn claim(&self, module: &Singleton, ctx: &ContextCell) -> Result<Claim> {
        module.claim(&self.stats, &mut ctx.borrow_mut())
    }

    /// 构造模块及其尚未实例化的依赖
    ///
    /// 依赖链用显式工作栈展开而不是递归，链长只受深度上限约束。
    fn instantiate(&self, root: &ModuleRef, ctx: &ContextCell) -> Result<Arc<ModuleObject>> {
        let base = ctx.borrow().depth();
        if let Claim::Ready(object) = self.claim(root, ctx)? {
            return Ok(object);
        }

        let mut run = Construction {
            ctx,
            base,
            stack: vec![Frame {
                module: Arc::clone(root),
                resolved: Vec::new(),
            }],
        };

        loop {
            let top = run.stack.len() - 1;
            let frame = &mut run.stack[top];

            if let Some(name) = frame.module.dependencies().get(frame.resolved.len()).cloned() {
                let module = self.lookup(&name).ok_or_else(|| InjectorError::DependencyNotFound {
                    name: name.clone(),
                    required_by: frame.module.name().to_string(),
                })?;
                match self.claim(&module, ctx)? {
                    Claim::Ready(object) => frame.resolved.push((name, object.instance().clone())),
                    Claim::Claimed => run.stack.push(Frame {
                        module,
                        resolved: Vec::new(),
                    }),
                }
                continue;
            }

            // 依赖全部就绪；模块在工厂执行期间仍留在链上
            let deps = Dependencies::new(std::mem::take(&mut frame.resolved));
            let object = frame.module.complete(&deps, &self.stats)?;
            ctx.borrow_mut().leave();
            let done = run.stack.swap_remove(top);

            match run.stack.last_mut() {
                Some(parent) => parent
                    .resolved
                    .push((done.module.name().to_string(), object.instance().clone())),
                None => return Ok(object),
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<ModuleRef> {
        self.registry.read().get(name)
    }

    /// 按声明顺序解析依赖名：先内部模块表，再外部依赖
    ///
    /// 已解析的依赖在后续失败时保持实例化状态。
    pub(crate) fn resolve_names(
        &self,
        owner: &str,
        names: &[String],
        external: Option<&ExternalDependencies>,
        lookup: Lookup,
        ctx: &ContextCell,
    ) -> Result<Dependencies> {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let instance = match self.lookup(name) {
                Some(module) => match lookup {
                    Lookup::Lazy => self.instantiate(&module, ctx)?.instance().clone(),
                    Lookup::InstantiatedOnly => module
                        .instance()
                        .ok_or_else(|| InjectorError::DependencyNotInstantiated {
                            name: name.clone(),
                            required_by: owner.to_string(),
                        })?
                        .instance()
                        .clone(),
                },
                None => external
                    .and_then(|external| external.get(name))
                    .cloned()
                    .ok_or_else(|| InjectorError::DependencyNotFound {
                        name: name.clone(),
                        required_by: owner.to_string(),
                    })?,
            };
            entries.push((name.clone(), instance));
        }
        Ok(Dependencies::new(entries))
    }
}

/// 模块注入器
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector {
    /// 使用默认配置创建注入器
    pub fn new() -> Self {
        Self::with_config(&InjectorConfig::default())
    }

    /// 创建注入器并注册 `$injector`
    pub fn with_config(config: &InjectorConfig) -> Self {
        Self::with_builtins(config, std::iter::empty())
    }

    /// 创建注入器，在 `$injector` 之后预置内置模块
    ///
    /// 内置模块不参与急切加载，也不计入注册统计；名称必须互不相同。
    pub(crate) fn with_builtins<I>(config: &InjectorConfig, builtins: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Injectable<ModuleReturn>)>,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<InjectorInner>| {
            let handle = InjectorHandle {
                inner: weak.clone(),
            };
            let factory_handle = handle.clone();
            let constructor = Injectable::without_dependencies(Factory::new(move |_| {
                Ok(ModuleObject::new(factory_handle.clone()))
            }));

            let mut registry = Registry::default();
            registry.push(Arc::new(Singleton::ready(
                INJECTOR_MODULE.to_string(),
                constructor,
                ModuleObject::new(handle),
            )));
            for (name, constructor) in builtins {
                debug_assert!(!registry.index.contains_key(name), "duplicate built-in {name}");
                registry.push(Arc::new(Singleton::new(name.to_string(), constructor, false)));
            }

            InjectorInner {
                registry: RwLock::new(registry),
                gate: ReentrantMutex::new(RefCell::new(ResolutionContext::new(config.max_depth))),
                max_depth: config.max_depth,
                stats: InnerStats::default(),
            }
        });
        Self { inner }
    }

    /// 注册模块
    ///
    /// 构造函数的形状在这里校验；构造本身延迟到首次解析。
    pub fn register(
        &self,
        name: &str,
        constructor: Declaration<ModuleReturn>,
        load_on_startup: bool,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(InjectorError::InvalidName {
                name: name.to_string(),
            });
        }

        let mut registry = self.inner.registry.write();
        if registry.index.contains_key(name) {
            return Err(InjectorError::DuplicateModule(name.to_string()));
        }
        let injectable = Injectable::parse(name, &constructor, &[])?;
        tracing::debug!(
            module = name,
            dependencies = ?injectable.dependencies(),
            load_on_startup,
            "Module registered"
        );
        registry.push(Arc::new(Singleton::new(
            name.to_string(),
            injectable,
            load_on_startup,
        )));
        self.inner.stats.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 解析声明的依赖并调用其工厂
    ///
    /// `deps` 只对 `Plain` 声明生效；依赖先在内部模块表查找（必要时构造），
    /// 再在 `external` 中查找。
    pub fn resolve<R>(
        &self,
        declaration: &Declaration<R>,
        deps: &[&str],
        external: &ExternalDependencies,
    ) -> Result<R> {
        let ctx = self.inner.gate.lock();
        let result = Injectable::parse(ANONYMOUS_OWNER, declaration, deps).and_then(|injectable| {
            let resolved = self.inner.resolve_names(
                ANONYMOUS_OWNER,
                injectable.dependencies(),
                Some(external),
                Lookup::Lazy,
                &ctx,
            )?;
            injectable.invoke(ANONYMOUS_OWNER, &resolved)
        });
        self.inner.stats.track(result)
    }

    /// 解析一个模块（必要时构造）
    pub fn module(&self, name: &str) -> Result<Arc<ModuleObject>> {
        let ctx = self.inner.gate.lock();
        let result = self
            .inner
            .lookup(name)
            .ok_or_else(|| InjectorError::DependencyNotFound {
                name: name.to_string(),
                required_by: INJECTOR_MODULE.to_string(),
            })
            .and_then(|module| self.inner.instantiate(&module, &ctx));
        self.inner.stats.track(result)
    }

    pub fn instance(&self, name: &str) -> Result<Instance> {
        self.module(name).map(|object| object.instance().clone())
    }

    /// 解析模块并向下转型
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.instance(name)?.downcast_named(name)
    }

    /// 按注册顺序遍历模块；回调期间不持有模块表锁
    pub fn for_each_module<F>(&self, mut callback: F)
    where
        F: FnMut(&ModuleRef),
    {
        let snapshot: Vec<ModuleRef> = self.inner.registry.read().order.clone();
        for module in &snapshot {
            callback(module);
        }
    }

    /// 按下标取模块，可观察到遍历过程中新增的注册
    pub fn module_at(&self, index: usize) -> Option<ModuleRef> {
        self.inner.registry.read().order.get(index).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.registry.read().index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.registry.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn module_names(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .order
            .iter()
            .map(|module| module.name().to_string())
            .collect()
    }

    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    pub fn stats(&self) -> InjectorStats {
        self.inner.stats.snapshot()
    }

    /// 供工厂持有的弱引用句柄
    pub fn handle(&self) -> InjectorHandle {
        InjectorHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// 构造指定模块（启动流程的急切加载阶段）
    pub(crate) fn instantiate(&self, module: &ModuleRef) -> Result<Arc<ModuleObject>> {
        let ctx = self.inner.gate.lock();
        let result = self.inner.instantiate(module, &ctx);
        self.inner.stats.track(result)
    }

    /// 执行生命周期钩子，依赖只在已实例化的模块中查找
    pub(crate) fn run_hook(
        &self,
        module: &str,
        phase: LifecyclePhase,
        hook: &Declaration<()>,
    ) -> Result<()> {
        let ctx = self.inner.gate.lock();
        let owner = format!("{}.{}", module, phase);
        let result = Injectable::parse(&owner, hook, &[]).and_then(|injectable| {
            let resolved = self.inner.resolve_names(
                &owner,
                injectable.dependencies(),
                None,
                Lookup::InstantiatedOnly,
                &ctx,
            )?;
            injectable.invoke(&owner, &resolved)
        });
        self.inner.stats.track(result)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("modules", &self.module_names())
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

/// `$injector` 模块的实例：指向注入器的弱引用
#[derive(Clone)]
pub struct InjectorHandle {
    inner: Weak<InjectorInner>,
}

impl InjectorHandle {
    pub fn upgrade(&self) -> Result<Injector> {
        self.inner
            .upgrade()
            .map(|inner| Injector { inner })
            .ok_or(InjectorError::InjectorDropped)
    }

    pub fn register(
        &self,
        name: &str,
        constructor: Declaration<ModuleReturn>,
        load_on_startup: bool,
    ) -> Result<()> {
        self.upgrade()?.register(name, constructor, load_on_startup)
    }

    pub fn resolve<R>(
        &self,
        declaration: &Declaration<R>,
        deps: &[&str],
        external: &ExternalDependencies,
    ) -> Result<R> {
        self.upgrade()?.resolve(declaration, deps, external)
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.upgrade()?.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.upgrade()
            .map(|injector| injector.contains(name))
            .unwrap_or(false)
    }
}

impl fmt::Debug for InjectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
