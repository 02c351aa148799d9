//! 模块运行所需的共享服务

use std::fmt;
use std::sync::Arc;

use super::assets::{AssetPublisher, NoopAssetPublisher};
use super::events::{EventSink, TracingEventSink};
use super::migrate::{NoopMigrator, SchemaMigrator};
use super::store::{MemoryModuleStore, ModuleStore};
use crate::core::ConfigStore;

/// 模块共享服务
///
/// 管理器和它管理的所有模块共用同一份服务。
#[derive(Clone)]
pub struct ModuleServices {
    /// 模块记录存储
    pub store: Arc<dyn ModuleStore>,
    /// 共享配置存储
    pub config: Arc<ConfigStore>,
    /// 迁移执行器
    pub migrator: Arc<dyn SchemaMigrator>,
    /// 资源发布器
    pub assets: Arc<dyn AssetPublisher>,
    /// 事件接收端
    pub events: Arc<dyn EventSink>,
}

impl ModuleServices {
    /// 全部使用内存实现或空实现
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryModuleStore::new()),
            config: Arc::new(ConfigStore::new()),
            migrator: Arc::new(NoopMigrator),
            assets: Arc::new(NoopAssetPublisher),
            events: Arc::new(TracingEventSink),
        }
    }

    /// 替换记录存储
    pub fn with_store(mut self, store: Arc<dyn ModuleStore>) -> Self {
        self.store = store;
        self
    }

    /// 替换配置存储
    pub fn with_config(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = config;
        self
    }

    /// 替换迁移执行器
    pub fn with_migrator(mut self, migrator: Arc<dyn SchemaMigrator>) -> Self {
        self.migrator = migrator;
        self
    }

    /// 替换资源发布器
    pub fn with_assets(mut self, assets: Arc<dyn AssetPublisher>) -> Self {
        self.assets = assets;
        self
    }

    /// 替换事件接收端
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl Default for ModuleServices {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for ModuleServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleServices").finish_non_exhaustive()
    }
}
