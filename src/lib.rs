//! # Chips Modules - 薯片模块管理器
//!
//! 管理可插拔模块的发现、注册和生命周期：
//!
//! - **模块生命周期**: 安装、启用、停用、卸载状态机，失败策略以报告的形式返回
//! - **依赖守卫**: 启用前检查依赖，停用前检查依赖方，注册时拒绝循环依赖
//! - **钩子系统**: 按优先级执行的钩子回调
//! - **模块配置**: 以模块名为命名空间的共享配置
//! - **外部加载**: 扫描模块目录和依赖包目录
//!
//! ## 快速开始
//!
//! ```rust
//! use chips_modules::{ManifestOnly, ModuleDescriptor, ModuleManager, ModuleServices};
//!
//! let mut manager = ModuleManager::new(ModuleServices::in_memory());
//! manager
//!     .register_behavior(ModuleDescriptor::new("Core", "1.0.0"), None, Box::new(ManifestOnly))
//!     .unwrap();
//! manager
//!     .register_behavior(
//!         ModuleDescriptor::new("Reports", "1.0.0").with_dependency("Core"),
//!         None,
//!         Box::new(ManifestOnly),
//!     )
//!     .unwrap();
//!
//! assert!(manager.enable("Reports").is_err());
//! assert!(manager.enable("Core").unwrap());
//! assert!(manager.enable("Reports").unwrap());
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 模块管理相关类型
//! - `core` - 应用配置和共享配置存储
//! - `utils` - 错误类型和日志系统

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    AssetPublisher, BroadcastEventSink, DependencyGraph, EventSink, ExternalModuleLoader,
    FsAssetPublisher, HookRegistry, JsonFileModuleStore, LedgerMigrator, LifecycleAction,
    LifecycleReport, ManifestOnly, ManifestParser, MemoryModuleStore, Module, ModuleBehavior,
    ModuleContext, ModuleDescriptor, ModuleEvent, ModuleFactories, ModuleInfo, ModuleManager,
    ModuleRecord, ModuleServices, ModuleSettings, ModuleStore, NoopMigrator, SchemaMigrator,
    TracingEventSink,
};

pub use utils::{error_code, CoreError, Result};
pub use utils::logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use core::{AppConfig, AppConfigBuilder, ConfigStore, LogConfig, ModuleDirConfig, ModulesConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
