use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bambo - 模块运行时命令行
#[derive(Parser, Debug)]
#[command(name = "bambo", version)]
#[command(about = "依赖注入模块运行时 - 按清单注册模块并执行三阶段启动")]
pub struct Args {
    /// 子命令
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径（默认 ~/.config/bambo/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 覆盖日志级别（trace/debug/info/warn/error）
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 安装清单中的模块并执行启动流程，输出构造与钩子顺序
    Boot {
        /// 模块清单（TOML）
        manifest: PathBuf,
        /// 同时输出注入器统计
        #[arg(long)]
        stats: bool,
    },
    /// 列出清单注册后的模块及其依赖，不执行启动
    List {
        /// 模块清单（TOML）
        manifest: PathBuf,
    },
}
