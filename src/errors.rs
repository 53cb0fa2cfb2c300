use thiserror::Error;

/// 工厂函数使用的装箱错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 注入器结果类型
pub type Result<T, E = InjectorError> = std::result::Result<T, E>;

/// 注入器错误
///
/// 所有错误都在 `register`/`resolve`/`boot` 调用中同步返回，没有延迟报告。
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("Module name must be a non-empty string, got '{name}'")]
    InvalidName { name: String },

    #[error("Module {0} is already registered")]
    DuplicateModule(String),

    #[error("Dependency #{position} of '{owner}' must be a module name: {reason}")]
    InvalidDependency {
        owner: String,
        position: usize,
        reason: String,
    },

    #[error("Constructor of '{owner}' must end with a factory function")]
    NotAFunction { owner: String },

    #[error("$inject of '{owner}' must be an array of module names: {reason}")]
    InvalidInjectAnnotation { owner: String, reason: String },

    #[error("Dependency module {name} not found (required by '{required_by}')")]
    DependencyNotFound { name: String, required_by: String },

    /// 生命周期钩子只能使用已经实例化的模块
    #[error("Dependency module {name} is registered but not instantiated yet (required by '{required_by}')")]
    DependencyNotInstantiated { name: String, required_by: String },

    #[error("Loop in module dependencies detected: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    /// 深度上限也会拒绝合法但过深的无环依赖链
    #[error("Loop in module dependencies detected: resolving '{module}' exceeded depth limit {limit}")]
    DepthLimitExceeded { module: String, limit: usize },

    #[error("Module {module} constructor is not correctly defined, it must return an object (got {found})")]
    InvalidModuleReturn { module: String, found: &'static str },

    #[error("Dependency '{name}' has type {actual}, expected {expected}")]
    DependencyTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Factory argument #{index} requested but only {len} dependencies were declared")]
    ArgumentOutOfRange { index: usize, len: usize },

    #[error("Factory of '{owner}' failed: {source}")]
    FactoryFailed {
        owner: String,
        #[source]
        source: BoxError,
    },

    #[error("Application has already been booted")]
    AlreadyBooted,

    #[error("Injector has been dropped")]
    InjectorDropped,
}

impl InjectorError {
    /// 是否为循环依赖（包括深度上限触发的近似判断）
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            InjectorError::DependencyCycle { .. } | InjectorError::DepthLimitExceeded { .. }
        )
    }

    /// 将工厂返回的错误还原为注入器错误
    ///
    /// 工厂内部通过 `$injector` 嵌套解析时产生的 `InjectorError` 原样向上传递，
    /// 其余错误包装为 `FactoryFailed`。
    pub(crate) fn from_factory(owner: &str, error: BoxError) -> Self {
        match error.downcast::<InjectorError>() {
            Ok(inner) => *inner,
            Err(source) => InjectorError::FactoryFailed {
                owner: owner.to_string(),
                source,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Configuration field '{0}' is invalid: {1}")]
    FieldInvalid(String, String),
}

/// 动态值形状错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("First parameter must be an array or an object, got {found}")]
    NotIterable { found: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = InjectorError::DependencyCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Loop in module dependencies detected: a -> b -> a"
        );
        assert!(err.is_cycle());
    }

    #[test]
    fn test_depth_limit_counts_as_cycle() {
        let err = InjectorError::DepthLimitExceeded {
            module: "deep".into(),
            limit: 3,
        };
        assert!(err.is_cycle());
        assert!(!InjectorError::AlreadyBooted.is_cycle());
    }

    #[test]
    fn test_from_factory_unwraps_injector_error() {
        let boxed: BoxError = Box::new(InjectorError::DuplicateModule("x".into()));
        let err = InjectorError::from_factory("owner", boxed);
        assert!(matches!(err, InjectorError::DuplicateModule(name) if name == "x"));
    }

    #[test]
    fn test_from_factory_wraps_foreign_error() {
        let boxed: BoxError = "disk on fire".into();
        let err = InjectorError::from_factory("owner", boxed);
        match err {
            InjectorError::FactoryFailed { owner, source } => {
                assert_eq!(owner, "owner");
                assert_eq!(source.to_string(), "disk on fire");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
