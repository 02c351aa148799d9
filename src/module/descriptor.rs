//! 模块描述数据定义
//!
//! 定义模块清单（module.json / module.yaml）、持久化记录和对外展示的
//! 模块信息三种数据结构。

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// 模块描述
///
/// 对应模块清单文件中的静态元数据，加载后 `name` 不再变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// 模块唯一名称
    pub name: String,

    /// 模块版本（语义化版本风格，仅供展示）
    #[serde(default = "default_version")]
    pub version: String,

    /// 模块描述
    #[serde(default)]
    pub description: String,

    /// 启用前必须已启用的模块名称列表
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 模块私有配置
    #[serde(default)]
    pub config: Map<String, Value>,

    /// 没有持久化记录时的默认启用状态
    #[serde(default)]
    pub enabled: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ModuleDescriptor {
    /// 创建新的模块描述
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            dependencies: vec![],
            config: Map::new(),
            enabled: false,
        }
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 添加依赖
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// 添加配置项
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// 设置默认启用状态
    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 配置命名空间（模块名小写）
    pub fn namespace(&self) -> String {
        self.name.to_lowercase()
    }

    /// 解析版本号
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }

    /// 是否依赖指定模块
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|dep| dep == name)
    }
}

/// 模块持久化记录
///
/// 每个模块名一条，进程重启后仍然存在，是 `enabled` 的权威来源。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// 模块名称
    pub name: String,
    /// 版本
    pub version: String,
    /// 描述
    #[serde(default)]
    pub description: String,
    /// 是否启用
    pub enabled: bool,
    /// 依赖列表
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// 配置
    #[serde(default)]
    pub config: Map<String, Value>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl ModuleRecord {
    /// 由描述生成记录
    pub fn from_descriptor(descriptor: &ModuleDescriptor, enabled: bool) -> Self {
        Self {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description.clone(),
            enabled,
            dependencies: descriptor.dependencies.clone(),
            config: descriptor.config.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// 模块信息
///
/// 描述加上实时启用状态的只读投影，供命令行和管理界面使用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// 模块名称
    pub name: String,
    /// 版本
    pub version: String,
    /// 描述
    pub description: String,
    /// 依赖列表
    pub dependencies: Vec<String>,
    /// 实时启用状态
    pub enabled: bool,
    /// 模块配置（共享配置存储中的命名空间）
    pub config: Map<String, Value>,
    /// 模块根目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// 已注册的钩子
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<String>,
}
