//! 模块管理
//!
//! - [`descriptor`] 模块清单、持久化记录和模块信息
//! - [`hooks`] 带优先级的钩子注册表
//! - [`settings`] 按模块命名空间访问共享配置
//! - [`lifecycle`] 模块及其安装、启用、停用、卸载状态机
//! - [`manager`] 模块注册表和依赖守卫
//! - [`loader`] 从目录和依赖包加载外部模块
//! - [`store`]、[`migrate`]、[`assets`]、[`events`] 模块运行依赖的外部服务

pub mod assets;
pub mod dependency;
pub mod descriptor;
pub mod events;
pub mod hooks;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod migrate;
pub mod parser;
pub mod services;
pub mod settings;
pub mod store;

// 重导出常用类型
pub use assets::{AssetPublisher, FsAssetPublisher, NoopAssetPublisher};
pub use dependency::DependencyGraph;
pub use descriptor::{ModuleDescriptor, ModuleInfo, ModuleRecord};
pub use events::{module_events, BroadcastEventSink, EventSink, ModuleEvent, TracingEventSink};
pub use hooks::{lifecycle_hooks, HookCallback, HookRegistry, DEFAULT_PRIORITY};
pub use lifecycle::{
    stages, AbsorbedFailure, LifecycleAction, LifecycleReport, ManifestOnly, Module,
    ModuleBehavior, ModuleContext, TransitionOutcome,
};
pub use loader::{ExternalModuleLoader, ModuleFactories, ModuleFactory, DEFAULT_NAMESPACE};
pub use manager::ModuleManager;
pub use migrate::{LedgerMigrator, NoopMigrator, SchemaMigrator};
pub use parser::ManifestParser;
pub use services::ModuleServices;
pub use settings::ModuleSettings;
pub use store::{JsonFileModuleStore, MemoryModuleStore, ModuleStore};
