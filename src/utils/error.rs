//! 模块管理错误类型定义
//!
//! 本模块定义了模块生命周期管理中使用的所有错误类型。
//!
//! 注意：模块未找到在管理器的公共接口上表现为 `Ok(false)` / `None`，
//! 只有依赖守卫、安装期迁移和启用回调失败会以错误形式穿过管理器边界。

use thiserror::Error;

/// 模块管理核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 模块注册与依赖错误 ====================

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 依赖未满足（依赖模块不存在或未启用）
    #[error("模块 '{module}' 的依赖未满足: {missing:?}")]
    DependencyUnmet {
        module: String,
        missing: Vec<String>,
    },

    /// 仍有启用中的模块依赖此模块
    #[error("模块 '{module}' 被以下已启用模块依赖，无法停用: {dependents:?}")]
    DependentsActive {
        module: String,
        dependents: Vec<String>,
    },

    /// 循环依赖
    #[error("检测到循环依赖: {0}")]
    CircularDependency(String),

    /// 无效的模块清单
    #[error("无效的模块清单: {0}")]
    InvalidManifest(String),

    // ==================== 生命周期错误 ====================

    /// 生命周期回调失败
    #[error("模块 '{module}' 的 {stage} 回调失败: {reason}")]
    LifecycleFailed {
        module: String,
        stage: String,
        reason: String,
    },

    /// 数据迁移失败
    #[error("模块 '{module}' 数据迁移失败: {reason}")]
    MigrationFailed {
        module: String,
        reason: String,
    },

    /// 资源发布失败
    #[error("模块 '{module}' 资源发布失败: {reason}")]
    AssetPublishFailed {
        module: String,
        reason: String,
    },

    /// 钩子执行失败
    #[error("钩子 '{hook}' 执行失败: {reason}")]
    HookFailed {
        hook: String,
        reason: String,
    },

    /// 事件派发失败
    #[error("事件派发失败: {0}")]
    EventDispatchFailed(String),

    // ==================== 持久化错误 ====================

    /// 模块记录持久化失败
    #[error("模块记录持久化失败: {0}")]
    Persistence(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误（模块实现方可直接使用 anyhow）
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 模块管理操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    pub const MODULE_DEPENDENCY_UNMET: &str = "MODULE-002";
    pub const MODULE_DEPENDENTS_ACTIVE: &str = "MODULE-003";
    pub const MODULE_CIRCULAR_DEPENDENCY: &str = "MODULE-004";
    pub const MODULE_INVALID_MANIFEST: &str = "MODULE-005";
    pub const MODULE_LIFECYCLE_FAILED: &str = "MODULE-006";
    pub const MODULE_HOOK_FAILED: &str = "MODULE-007";

    // 安装错误 (INSTALL-xxx)
    pub const INSTALL_MIGRATION_FAILED: &str = "INSTALL-001";
    pub const INSTALL_ASSET_FAILED: &str = "INSTALL-002";

    // 存储错误 (STORE-xxx)
    pub const STORE_PERSISTENCE_FAILED: &str = "STORE-001";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::DependencyUnmet { .. } => error_code::MODULE_DEPENDENCY_UNMET,
            CoreError::DependentsActive { .. } => error_code::MODULE_DEPENDENTS_ACTIVE,
            CoreError::CircularDependency(_) => error_code::MODULE_CIRCULAR_DEPENDENCY,
            CoreError::InvalidManifest(_) => error_code::MODULE_INVALID_MANIFEST,
            CoreError::LifecycleFailed { .. } => error_code::MODULE_LIFECYCLE_FAILED,
            CoreError::HookFailed { .. } => error_code::MODULE_HOOK_FAILED,
            CoreError::MigrationFailed { .. } => error_code::INSTALL_MIGRATION_FAILED,
            CoreError::AssetPublishFailed { .. } => error_code::INSTALL_ASSET_FAILED,
            CoreError::Persistence(_) => error_code::STORE_PERSISTENCE_FAILED,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 是否为依赖守卫拒绝的错误
    pub fn is_dependency_guard(&self) -> bool {
        matches!(
            self,
            CoreError::DependencyUnmet { .. } | CoreError::DependentsActive { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::DependencyUnmet {
            module: "Reports".to_string(),
            missing: vec!["Core".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("Reports"));
        assert!(text.contains("Core"));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::ModuleNotFound("test".to_string());
        assert_eq!(err.error_code(), error_code::MODULE_NOT_FOUND);

        let err = CoreError::MigrationFailed {
            module: "Blog".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.error_code(), error_code::INSTALL_MIGRATION_FAILED);
    }

    #[test]
    fn test_dependency_guard_classification() {
        let err = CoreError::DependentsActive {
            module: "Core".to_string(),
            dependents: vec!["Blog".to_string()],
        };
        assert!(err.is_dependency_guard());
        assert!(!CoreError::Internal("x".to_string()).is_dependency_guard());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_anyhow_conversion() {
        let core_err: CoreError = anyhow::anyhow!("module author failure").into();
        assert!(matches!(core_err, CoreError::Other(_)));
        assert_eq!(core_err.to_string(), "module author failure");
    }
}
