//! 启动流程
//!
//! 1. 急切加载：按注册顺序构造所有 `load_on_startup` 模块（连带其依赖）
//! 2. 依次执行 `$init`、`$build`、`$final` 三个阶段，
//!    每个阶段只覆盖当时已经实例化的模块
//!
//! 任一步失败即中止整个启动。

use std::time::{Duration, Instant};

use super::container::{Injector, LifecyclePhase};
use crate::errors::Result;
use crate::logging::OperationTimer;

/// 启动结果
#[derive(Debug, Clone, Default)]
pub struct BootReport {
    /// 急切加载阶段请求的模块，按注册顺序
    pub eager: Vec<String>,
    /// 启动结束时已实例化的模块，按注册顺序
    pub instantiated: Vec<String>,
    /// 已执行的钩子，按执行顺序
    pub hooks: Vec<(LifecyclePhase, String)>,
    pub elapsed: Duration,
}

impl BootReport {
    /// 某个阶段执行过钩子的模块
    pub fn hooks_for(&self, phase: LifecyclePhase) -> Vec<&str> {
        self.hooks
            .iter()
            .filter(|(hook_phase, _)| *hook_phase == phase)
            .map(|(_, module)| module.as_str())
            .collect()
    }
}

/// 启动流程执行器
pub struct BootSequencer<'a> {
    injector: &'a Injector,
}

impl<'a> BootSequencer<'a> {
    pub fn new(injector: &'a Injector) -> Self {
        Self { injector }
    }

    /// 执行完整的启动流程
    pub fn run(&self) -> Result<BootReport> {
        let started = Instant::now();
        let mut report = BootReport::default();

        self.load_eager_modules(&mut report)?;
        for phase in LifecyclePhase::ALL {
            self.run_phase(phase, &mut report)?;
        }

        self.injector.for_each_module(|module| {
            if module.is_instantiated() {
                report.instantiated.push(module.name().to_string());
            }
        });
        report.elapsed = started.elapsed();

        tracing::info!(
            eager = report.eager.len(),
            instantiated = report.instantiated.len(),
            hooks = report.hooks.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "Boot sequence completed"
        );
        Ok(report)
    }

    /// 急切加载阶段
    ///
    /// 按下标遍历，构造过程中新注册的模块也会被访问到。
    fn load_eager_modules(&self, report: &mut BootReport) -> Result<()> {
        let timer = OperationTimer::new("boot.eager");
        let mut index = 0;
        while let Some(module) = self.injector.module_at(index) {
            if module.load_on_startup() {
                self.injector.instantiate(&module)?;
                report.eager.push(module.name().to_string());
            }
            index += 1;
        }
        timer.finish();
        Ok(())
    }

    /// 执行一个生命周期阶段
    ///
    /// 每一步重新读取模块的实例化状态：同一阶段中由前面的钩子新构造的模块，
    /// 只要尚未遍历到，也会执行该阶段的钩子。
    fn run_phase(&self, phase: LifecyclePhase, report: &mut BootReport) -> Result<()> {
        let timer = OperationTimer::new("boot.phase").with_metadata("phase", phase.as_str());
        let mut index = 0;
        while let Some(module) = self.injector.module_at(index) {
            index += 1;
            let Some(object) = module.instance() else {
                continue;
            };
            let Some(hook) = object.hook(phase) else {
                continue;
            };
            tracing::debug!(module = module.name(), phase = %phase, "Running lifecycle hook");
            self.injector.run_hook(module.name(), phase, hook)?;
            report.hooks.push((phase, module.name().to_string()));
        }
        timer.finish();
        Ok(())
    }
}
