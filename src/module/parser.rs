//! 模块清单解析器
//!
//! 模块根目录下的 `module.json` 优先，其次是 `module.yaml`。

use std::path::{Path, PathBuf};

use tracing::warn;

use super::descriptor::ModuleDescriptor;
use crate::core::config::is_json;
use crate::utils::{CoreError, Result};

/// JSON 清单文件名
pub const JSON_MANIFEST: &str = "module.json";

/// YAML 清单文件名
pub const YAML_MANIFEST: &str = "module.yaml";

/// 模块清单解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    /// 查找模块目录下的清单文件
    pub async fn manifest_path(root: &Path) -> Option<PathBuf> {
        for file in [JSON_MANIFEST, YAML_MANIFEST] {
            let path = root.join(file);
            if is_file(&path).await {
                return Some(path);
            }
        }
        None
    }

    /// 读取模块目录的清单
    ///
    /// 目录下没有清单文件时返回 `Ok(None)`。
    pub async fn read_dir(root: &Path) -> Result<Option<ModuleDescriptor>> {
        let Some(path) = Self::manifest_path(root).await else {
            return Ok(None);
        };
        let content = tokio::fs::read_to_string(&path).await?;
        Self::parse_str(&content, is_json(&path)).map(Some)
    }

    /// 解析清单内容并校验
    pub fn parse_str(content: &str, json: bool) -> Result<ModuleDescriptor> {
        let descriptor: ModuleDescriptor = if json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        Self::validate(&descriptor)?;
        Ok(descriptor)
    }

    /// 校验模块描述
    ///
    /// - 名称非空，字母开头，只含字母、数字、下划线和连字符
    /// - 依赖名称非空，且不能依赖自身
    ///
    /// 版本号不是语义化版本时只输出警告。
    pub fn validate(descriptor: &ModuleDescriptor) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if descriptor.name.is_empty() {
            errors.push("模块名称不能为空".to_string());
        } else if !is_valid_name(&descriptor.name) {
            errors.push(format!(
                "模块名称 '{}' 格式无效，只允许字母、数字、下划线和连字符",
                descriptor.name
            ));
        }

        for (index, dep) in descriptor.dependencies.iter().enumerate() {
            if dep.trim().is_empty() {
                errors.push(format!("第 {} 个依赖的名称不能为空", index + 1));
            } else if *dep == descriptor.name {
                errors.push(format!("模块 '{}' 不能依赖自身", descriptor.name));
            }
        }

        if descriptor.parsed_version().is_none() {
            warn!(
                module = %descriptor.name,
                version = %descriptor.version,
                "版本号不是语义化版本格式"
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidManifest(errors.join("; ")))
        }
    }
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}
