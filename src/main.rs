//! Chips Modules 命令行入口
//!
//! # 命令概览
//!
//! - `list` - 列出所有模块
//! - `enable <name>` / `disable <name>` - 启用、停用模块
//! - `install <name>` / `uninstall <name>` - 安装、卸载模块
//! - `info <name>` - 显示模块信息
//! - `check-config` - 验证配置文件
//!
//! 成功时退出码为 0，失败时为 1。
//!
//! # 使用示例
//!
//! ```bash
//! chips-modules -c config.yaml list
//! chips-modules install Blog
//! chips-modules --format json info Blog
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use chips_modules::{
    AppConfig, ConfigStore, CoreError, ExternalModuleLoader, FsAssetPublisher,
    JsonFileModuleStore, LedgerMigrator, LifecycleAction, LifecycleReport, LogGuard, Logger,
    LoggerConfig, ModuleFactories, ModuleInfo, ModuleManager, ModuleServices, TracingEventSink,
};

/// Chips Modules - 薯片模块管理器
#[derive(Parser)]
#[command(name = "chips-modules")]
#[command(version, about = "管理可插拔模块的生命周期", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// 日志级别，覆盖配置文件 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 输出格式
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 列出所有模块
    List,

    /// 启用模块
    Enable {
        /// 模块名称
        name: String,
    },

    /// 停用模块
    Disable {
        /// 模块名称
        name: String,
    },

    /// 安装模块（执行迁移、发布资源并启用）
    Install {
        /// 模块名称
        name: String,
    },

    /// 卸载模块（停用、回滚迁移并删除资源）
    Uninstall {
        /// 模块名称
        name: String,
    },

    /// 显示模块信息
    Info {
        /// 模块名称
        name: String,
    },

    /// 验证配置文件
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(long = "file")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let format = cli.format;
    let (name, action) = match cli.command {
        Commands::CheckConfig { config } => {
            return check_config(&config.unwrap_or(cli.config), format).await;
        }
        Commands::List => {
            let (manager, _guard) = start(&cli.config, cli.log_level).await?;
            print_list(&manager.all_modules_info(), format)?;
            return Ok(true);
        }
        Commands::Info { name } => {
            let (manager, _guard) = start(&cli.config, cli.log_level).await?;
            return match manager.module_info(&name) {
                Some(info) => {
                    print_info(&info, format)?;
                    Ok(true)
                }
                None => {
                    print_error(&name, &CoreError::ModuleNotFound(name.clone()), format)?;
                    Ok(false)
                }
            };
        }
        Commands::Enable { name } => (name, LifecycleAction::Enable),
        Commands::Disable { name } => (name, LifecycleAction::Disable),
        Commands::Install { name } => (name, LifecycleAction::Install),
        Commands::Uninstall { name } => (name, LifecycleAction::Uninstall),
    };

    let (mut manager, _guard) = start(&cli.config, cli.log_level).await?;
    match manager.transition(&name, action) {
        Ok(Some(report)) => {
            print_report(&report, format)?;
            Ok(true)
        }
        Ok(None) => {
            print_error(&name, &CoreError::ModuleNotFound(name.clone()), format)?;
            Ok(false)
        }
        Err(e) => {
            print_error(&name, &e, format)?;
            Ok(false)
        }
    }
}

/// 加载配置、初始化日志并加载所有模块
async fn start(path: &Path, log_level: Option<String>) -> anyhow::Result<(ModuleManager, LogGuard)> {
    let mut config = load_config(path).await?;
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    let guard = Logger::try_init(LoggerConfig::from_log_config(&config.logging));
    let manager = bootstrap(&config).await?;
    Ok((manager, guard))
}

/// 加载配置文件，不存在时使用默认配置
async fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        AppConfig::from_file(path)
            .await
            .with_context(|| format!("无法加载配置文件 {}", path.display()))
    } else {
        debug!(path = %path.display(), "配置文件不存在，使用默认配置");
        Ok(AppConfig::default())
    }
}

/// 按配置构造服务并加载所有模块
async fn bootstrap(config: &AppConfig) -> anyhow::Result<ModuleManager> {
    let modules = &config.modules;

    let settings = Arc::new(ConfigStore::new());
    if let Some(ref file) = modules.settings_file {
        settings
            .load_file(file)
            .with_context(|| format!("无法加载模块配置 {}", file.display()))?;
    }

    let store = JsonFileModuleStore::open(&modules.store_path)
        .with_context(|| format!("无法打开模块记录 {}", modules.store_path.display()))?;
    let migrator = LedgerMigrator::open(&modules.migration_ledger)
        .with_context(|| format!("无法打开迁移台账 {}", modules.migration_ledger.display()))?;

    let services = ModuleServices::in_memory()
        .with_store(Arc::new(store))
        .with_config(settings)
        .with_migrator(Arc::new(migrator))
        .with_assets(Arc::new(FsAssetPublisher::new(&modules.public_dir)))
        .with_events(Arc::new(TracingEventSink));

    let mut manager = ModuleManager::new(services);
    let mut loader = ExternalModuleLoader::new(ModuleFactories::new().with_manifest_fallback())
        .with_default_namespace(&modules.default_namespace);

    for dir in &modules.module_dirs {
        loader.load_from_path(&mut manager, &dir.path, &dir.namespace).await;
    }
    if let Some(ref vendor) = modules.vendor_dir {
        loader.load_from_vendor(&mut manager, vendor).await;
    }

    info!(count = manager.len(), "模块加载完成");
    Ok(manager)
}

/// 检查配置文件
async fn check_config(path: &Path, format: OutputFormat) -> anyhow::Result<bool> {
    if !path.exists() {
        eprintln!("配置文件不存在: {}", path.display());
        return Ok(false);
    }

    match AppConfig::from_file(path).await {
        Ok(config) => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Text => {
                    println!("配置文件有效: {}", path.display());
                    println!("────────────────────────────────────────");
                    println!("  [日志配置]");
                    println!("    日志级别:       {}", config.logging.level);
                    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
                    println!("  [模块配置]");
                    for dir in &config.modules.module_dirs {
                        println!("    模块目录:       {} ({})", dir.path.display(), dir.namespace);
                    }
                    if let Some(ref vendor) = config.modules.vendor_dir {
                        println!("    依赖目录:       {}", vendor.display());
                    }
                    println!("    资源目录:       {}", config.modules.public_dir.display());
                    println!("    模块记录:       {}", config.modules.store_path.display());
                    println!("    迁移台账:       {}", config.modules.migration_ledger.display());
                    println!("────────────────────────────────────────");
                }
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("配置文件无效 [{}]: {}", e.error_code(), e);
            Ok(false)
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "启用"
    } else {
        "停用"
    }
}

fn print_list(infos: &[ModuleInfo], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(infos)?),
        OutputFormat::Text => {
            if infos.is_empty() {
                println!("没有发现任何模块");
                return Ok(());
            }
            println!("{:<24} {:<10} {:<6} {}", "名称", "版本", "状态", "依赖");
            for info in infos {
                println!(
                    "{:<24} {:<10} {:<6} {}",
                    info.name,
                    info.version,
                    yes_no(info.enabled),
                    info.dependencies.join(", ")
                );
            }
        }
    }
    Ok(())
}

fn print_info(info: &ModuleInfo, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        OutputFormat::Text => {
            println!("模块:   {}", info.name);
            println!("版本:   {}", info.version);
            println!("描述:   {}", info.description);
            println!("状态:   {}", yes_no(info.enabled));
            println!("依赖:   {}", info.dependencies.join(", "));
            if let Some(ref path) = info.path {
                println!("路径:   {}", path.display());
            }
            if !info.hooks.is_empty() {
                println!("钩子:   {}", info.hooks.join(", "));
            }
            if !info.config.is_empty() {
                println!("配置:   {}", serde_json::to_string_pretty(&info.config)?);
            }
        }
    }
    Ok(())
}

fn print_report(report: &LifecycleReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            if report.applied() {
                println!("模块 {} {} 完成", report.module, report.action);
            } else {
                println!("模块 {} 已处于目标状态，{} 未执行", report.module, report.action);
            }
            for failure in &report.absorbed {
                println!("  警告 [{}]: {}", failure.stage, failure.message);
            }
        }
    }
    Ok(())
}

fn print_error(name: &str, err: &CoreError, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "module": name,
                "code": err.error_code(),
                "error": err.to_string(),
            }))?
        ),
        OutputFormat::Text => eprintln!("{} [{}]: {}", name, err.error_code(), err),
    }
    Ok(())
}
