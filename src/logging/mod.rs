use std::str::FromStr;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// 覆盖日志级别的环境变量（EnvFilter 语法）
pub const LOG_FILTER_ENV: &str = "BAMBO_LOG";

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnvironment {
    /// 开发环境
    Development,
    /// 测试环境
    Testing,
    /// 生产环境
    Production,
}

impl FromStr for LoggingEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(LoggingEnvironment::Development),
            "testing" | "test" => Ok(LoggingEnvironment::Testing),
            "production" | "prod" => Ok(LoggingEnvironment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读格式
    Pretty,
    /// JSON 格式
    Json,
    /// 紧凑格式
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 环境
    pub environment: LoggingEnvironment,
    /// 日志级别
    pub level: Level,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::INFO,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            level: Level::INFO,
            format: LogFormat::Json,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 创建测试环境配置
    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            level: Level::ERROR,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 按环境选择预设
    pub fn for_environment(environment: LoggingEnvironment) -> Self {
        match environment {
            LoggingEnvironment::Development => Self::development(),
            LoggingEnvironment::Testing => Self::testing(),
            LoggingEnvironment::Production => Self::production(),
        }
    }

    /// 配置级别作为默认指令，`BAMBO_LOG` 可以覆盖
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .with_env_var(LOG_FILTER_ENV)
            .from_env_lossy()
    }
}

/// 初始化日志系统
///
/// 已经安装过全局 subscriber 时返回错误，不会 panic。
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ansi = config.environment != LoggingEnvironment::Production;
    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json | LogFormat::Compact => {
            // 未启用 tracing-subscriber 的 json 特性，JSON 降级为紧凑格式
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::debug!(
        environment = ?config.environment,
        level = ?config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作性能计时器
pub struct OperationTimer {
    start: Instant,
    operation: String,
    metadata: std::collections::HashMap<String, String>,
    finished: bool,
}

impl OperationTimer {
    /// 创建新的计时器
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: std::collections::HashMap::new(),
            finished: false,
        }
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// 完成计时并记录日志
    pub fn finish(mut self) {
        let duration = self.start.elapsed();
        self.finished = true;

        tracing::info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            duration_ns = duration.as_nanos(),
            metadata = ?self.metadata,
            "Operation completed"
        );
    }

    /// 获取当前经过时间
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        // 未调用 finish 说明操作中途失败
        if self.finished {
            return;
        }
        tracing::debug!(
            operation = %self.operation,
            duration_ms = self.start.elapsed().as_millis(),
            metadata = ?self.metadata,
            "Operation aborted"
        );
    }
}
