//! 模块清单
//!
//! 用 TOML 描述一组模块及其依赖，安装到 `Bambo` 后每个模块的构造和钩子执行
//! 都会记录到共享的 `Trace` 中，命令行用它展示启动顺序。
//!
//! ```toml
//! [[module]]
//! name = "clock"
//! dependencies = ["$observer"]
//!
//! [module.hooks]
//! init = ["$observer"]
//! ```

use parking_lot::Mutex;
use serde::Deserialize;
use std::{fmt, fs, path::Path, sync::Arc};

use crate::app::Bambo;
use crate::errors::{ConfigError, InjectorError};
use crate::infrastructure::container::{Declaration, LifecyclePhase, ModuleObject, ModuleReturn};

fn default_true() -> bool {
    true
}

/// 清单中的一个模块
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    /// 依赖注解，必须是字符串数组；原样交给注入器校验
    #[serde(default)]
    pub dependencies: Option<toml::Value>,
    #[serde(default = "default_true")]
    pub load_on_startup: bool,
    #[serde(default)]
    pub hooks: HookEntries,
}

/// 生命周期钩子及其依赖
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookEntries {
    pub init: Option<toml::Value>,
    pub build: Option<toml::Value>,
    #[serde(rename = "final")]
    pub final_: Option<toml::Value>,
}

impl HookEntries {
    fn get(&self, phase: LifecyclePhase) -> Option<&toml::Value> {
        match phase {
            LifecyclePhase::Init => self.init.as_ref(),
            LifecyclePhase::Build => self.build.as_ref(),
            LifecyclePhase::Final => self.final_.as_ref(),
        }
    }
}

/// 模块清单
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,
}

/// 记录的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Constructed {
        module: String,
        dependencies: Vec<String>,
    },
    Hook {
        module: String,
        phase: LifecyclePhase,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Constructed {
                module,
                dependencies,
            } if dependencies.is_empty() => write!(f, "construct {}", module),
            TraceEvent::Constructed {
                module,
                dependencies,
            } => write!(f, "construct {} <- [{}]", module, dependencies.join(", ")),
            TraceEvent::Hook { module, phase } => write!(f, "{} {}", phase, module),
        }
    }
}

/// 共享的事件记录
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<TraceEvent>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: TraceEvent) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.lock().clone()
    }
}

/// 清单安装的模块实例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedModule {
    pub name: String,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.to_string_lossy().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(display.clone(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlParse(display, e))
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))
    }

    /// 注册清单中的全部模块
    ///
    /// 依赖和钩子依赖都走 `$inject` 注解路径，形状错误在注册时报出。
    pub fn install(&self, app: &Bambo, trace: &Trace) -> Result<(), InjectorError> {
        for entry in &self.modules {
            let constructor = traced_constructor(entry, trace)?;
            app.module_with(&entry.name, constructor, entry.load_on_startup)?;
        }
        tracing::debug!(modules = self.modules.len(), "Manifest installed");
        Ok(())
    }
}

/// TOML 值转为注解使用的动态值；缺省视为空数组
fn annotation(owner: &str, value: Option<&toml::Value>) -> Result<serde_json::Value, InjectorError> {
    match value {
        None => Ok(serde_json::Value::Array(Vec::new())),
        Some(value) => serde_json::to_value(value).map_err(|e| {
            InjectorError::InvalidInjectAnnotation {
                owner: owner.to_string(),
                reason: e.to_string(),
            }
        }),
    }
}

fn traced_constructor(
    entry: &ModuleEntry,
    trace: &Trace,
) -> Result<Declaration<ModuleReturn>, InjectorError> {
    let mut hooks = Vec::new();
    for phase in LifecyclePhase::ALL {
        if let Some(value) = entry.hooks.get(phase) {
            let owner = format!("{}.{}", entry.name, phase);
            let inject = annotation(&owner, Some(value))?;
            let trace = trace.clone();
            let module = entry.name.clone();
            let hook: Declaration<()> = Declaration::annotated(inject, move |_| {
                trace.record(TraceEvent::Hook {
                    module: module.clone(),
                    phase,
                });
                Ok(())
            });
            hooks.push((phase, hook));
        }
    }

    let inject = annotation(&entry.name, entry.dependencies.as_ref())?;
    let trace = trace.clone();
    let name = entry.name.clone();
    Ok(Declaration::annotated(inject, move |deps| {
        trace.record(TraceEvent::Constructed {
            module: name.clone(),
            dependencies: deps.names().map(str::to_string).collect(),
        });
        let object = hooks.iter().fold(
            ModuleObject::new(TracedModule { name: name.clone() }),
            |object, (phase, hook)| object.with_hook(*phase, hook.clone()),
        );
        Ok(object)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[module]]
        name = "panel"
        dependencies = ["clock"]

        [module.hooks]
        init = ["clock"]
        final = []

        [[module]]
        name = "clock"
        load_on_startup = false
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.modules.len(), 2);
        assert!(manifest.modules[0].load_on_startup);
        assert!(!manifest.modules[1].load_on_startup);
        assert!(manifest.modules[0].hooks.init.is_some());
        assert!(manifest.modules[0].hooks.build.is_none());
        assert!(manifest.modules[0].hooks.final_.is_some());
    }

    #[test]
    fn test_install_and_boot_records_trace() {
        let app = Bambo::new();
        let trace = Trace::new();
        Manifest::parse(SAMPLE).unwrap().install(&app, &trace).unwrap();
        app.boot().unwrap();

        let lines: Vec<String> = trace.events().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "construct clock",
                "construct panel <- [clock]",
                "$init panel",
                "$final panel",
            ]
        );
        assert_eq!(app.get::<TracedModule>("panel").unwrap().name, "panel");
    }

    #[test]
    fn test_dependencies_must_be_array_of_strings() {
        let manifest = Manifest::parse(
            r#"
            [[module]]
            name = "odd"
            dependencies = "clock"
            "#,
        )
        .unwrap();
        let err = manifest.install(&Bambo::new(), &Trace::new()).unwrap_err();
        assert!(matches!(err, InjectorError::InvalidInjectAnnotation { .. }));
    }
}
