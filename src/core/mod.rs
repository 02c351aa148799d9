//! 核心模块
//!
//! 包含应用配置与共享配置存储。

pub mod config;
pub mod config_store;

pub use config::{AppConfig, AppConfigBuilder, LogConfig, ModuleDirConfig, ModulesConfig};
pub use config_store::ConfigStore;
