//! 应用配置
//!
//! 定义模块管理器的配置结构和加载逻辑。配置文件按扩展名识别
//! YAML 或 JSON 格式。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::Result;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 模块目录配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDirConfig {
    /// 目录路径
    pub path: PathBuf,

    /// 该目录下模块的命名空间
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// 模块管理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// 模块目录列表
    #[serde(default)]
    pub module_dirs: Vec<ModuleDirConfig>,

    /// 第三方包目录（扫描 `<org>/<package>/modules`）
    #[serde(default)]
    pub vendor_dir: Option<PathBuf>,

    /// 资源发布目录
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// 模块记录存储文件
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// 迁移台账文件
    #[serde(default = "default_ledger_path")]
    pub migration_ledger: PathBuf,

    /// 运行时配置文件（加载到共享配置存储）
    #[serde(default)]
    pub settings_file: Option<PathBuf>,

    /// 无法确定命名空间时使用的默认值
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_namespace() -> String {
    "Modules".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("storage/modules.json")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("storage/migrations.json")
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            module_dirs: vec![],
            vendor_dir: None,
            public_dir: default_public_dir(),
            store_path: default_store_path(),
            migration_ledger: default_ledger_path(),
            settings_file: None,
            default_namespace: default_namespace(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 模块管理配置
    #[serde(default)]
    pub modules: ModulesConfig,
}

impl AppConfig {
    /// 创建配置构建器
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// 从文件加载配置
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await?;

        let mut config: AppConfig = if is_json(&path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: AppConfig) {
        // 只覆盖非默认值
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        for dir in other.modules.module_dirs {
            if !self.modules.module_dirs.contains(&dir) {
                self.modules.module_dirs.push(dir);
            }
        }
        if other.modules.vendor_dir.is_some() {
            self.modules.vendor_dir = other.modules.vendor_dir;
        }
        if other.modules.public_dir != default_public_dir() {
            self.modules.public_dir = other.modules.public_dir;
        }
        if other.modules.store_path != default_store_path() {
            self.modules.store_path = other.modules.store_path;
        }
        if other.modules.migration_ledger != default_ledger_path() {
            self.modules.migration_ledger = other.modules.migration_ledger;
        }
        if other.modules.settings_file.is_some() {
            self.modules.settings_file = other.modules.settings_file;
        }
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 添加模块目录
    pub fn module_dir(mut self, dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        self.config.modules.module_dirs.push(ModuleDirConfig {
            path: dir.into(),
            namespace: namespace.into(),
        });
        self
    }

    /// 设置第三方包目录
    pub fn vendor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.modules.vendor_dir = Some(dir.into());
        self
    }

    /// 设置资源发布目录
    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.modules.public_dir = dir.into();
        self
    }

    /// 设置模块记录存储文件
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.modules.store_path = path.into();
        self
    }

    /// 设置迁移台账文件
    pub fn migration_ledger(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.modules.migration_ledger = path.into();
        self
    }

    /// 构建配置
    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.modules.default_namespace, "Modules");
        assert_eq!(config.modules.store_path, PathBuf::from("storage/modules.json"));
    }

    #[test]
    fn test_config_builder() {
        let config = AppConfig::builder()
            .log_level("debug")
            .module_dir("./modules", "App")
            .vendor_dir("./vendor")
            .build();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.modules.module_dirs.len(), 1);
        assert_eq!(config.modules.module_dirs[0].namespace, "App");
        assert_eq!(config.modules.vendor_dir, Some(PathBuf::from("./vendor")));
    }

    #[test]
    fn test_config_merge() {
        let mut base = AppConfig::builder().module_dir("./modules", "App").build();
        let overrides = AppConfig::builder()
            .log_level("debug")
            .module_dir("./modules", "App")
            .module_dir("./plugins", "Plugins")
            .store_path("/data/modules.json")
            .build();

        base.merge(overrides);

        assert_eq!(base.logging.level, "debug");
        // 重复目录不会被追加两次
        assert_eq!(base.modules.module_dirs.len(), 2);
        assert_eq!(base.modules.store_path, PathBuf::from("/data/modules.json"));
    }

    #[test]
    fn test_yaml_defaults_for_module_dir() {
        let yaml = r#"
modules:
  module_dirs:
    - path: ./modules
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.modules.module_dirs[0].namespace, "Modules");
        assert_eq!(config.modules.public_dir, PathBuf::from("public"));
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"logging": {"level": "warn"}}"#).unwrap();

        let config = AppConfig::from_file(&path).await.unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.config_path, Some(path));
    }
}
