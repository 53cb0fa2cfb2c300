mod args;

use anyhow::{anyhow, Context};
use clap::Parser;

use args::{Args, Command};
use bambo::config::{ConfigLoader, RuntimeConfig};
use bambo::logging::init_logging;
use bambo::manifest::{Manifest, Trace};
use bambo::Bambo;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_config_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load_config().context("加载配置失败")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.to_lowercase();
        config.validate()?;
    }

    let logging = config.logging.to_logging_config()?;
    init_logging(logging).map_err(|e| anyhow!("初始化日志失败: {}", e))?;

    match args.command {
        Command::Boot { manifest, stats } => {
            let (app, trace) = install(&config, &manifest)?;
            let report = app.boot()?;

            for event in trace.events() {
                println!("{}", event);
            }
            println!(
                "booted {} module(s), {} hook(s) in {:?}",
                report.instantiated.len(),
                report.hooks.len(),
                report.elapsed
            );
            if stats {
                println!("{}", app.injector().stats().performance_summary());
            }
        }
        Command::List { manifest } => {
            let (app, _trace) = install(&config, &manifest)?;
            app.injector().for_each_module(|module| {
                let mode = if module.load_on_startup() { "eager" } else { "lazy" };
                if module.dependencies().is_empty() {
                    println!("{} ({})", module.name(), mode);
                } else {
                    println!(
                        "{} ({}) <- {}",
                        module.name(),
                        mode,
                        module.dependencies().join(", ")
                    );
                }
            });
        }
    }

    Ok(())
}

fn install(config: &RuntimeConfig, path: &std::path::Path) -> anyhow::Result<(Bambo, Trace)> {
    let manifest = Manifest::from_file(path)
        .with_context(|| format!("读取模块清单失败: {}", path.display()))?;
    let app = Bambo::with_config(config);
    let trace = Trace::new();
    manifest.install(&app, &trace)?;
    Ok((app, trace))
}
