//! 模块静态资源发布

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::utils::{CoreError, Result};

/// 资源发布接口
pub trait AssetPublisher: Send + Sync {
    /// 把 `source` 目录发布到模块的公开位置，返回复制的文件数
    fn publish(&self, module: &str, source: &Path) -> Result<usize>;

    /// 删除模块已发布的资源
    fn remove(&self, module: &str) -> Result<()>;
}

/// 不发布任何资源
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAssetPublisher;

impl AssetPublisher for NoopAssetPublisher {
    fn publish(&self, _module: &str, _source: &Path) -> Result<usize> {
        Ok(0)
    }

    fn remove(&self, _module: &str) -> Result<()> {
        Ok(())
    }
}

/// 文件系统资源发布
///
/// 资源复制到 `<public_dir>/modules/<模块名小写>/`。
#[derive(Debug, Clone)]
pub struct FsAssetPublisher {
    public_dir: PathBuf,
}

impl FsAssetPublisher {
    /// 以公开目录创建发布器
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    /// 模块资源的发布位置
    pub fn target_dir(&self, module: &str) -> PathBuf {
        self.public_dir.join("modules").join(module.to_lowercase())
    }
}

fn copy_tree(source: &Path, target: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(target)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), &to)?;
            copied += 1;
        }
    }
    Ok(copied)
}

impl AssetPublisher for FsAssetPublisher {
    fn publish(&self, module: &str, source: &Path) -> Result<usize> {
        if !source.is_dir() {
            debug!(module, path = %source.display(), "没有资源目录，跳过发布");
            return Ok(0);
        }

        let target = self.target_dir(module);
        let copied = copy_tree(source, &target).map_err(|e| CoreError::AssetPublishFailed {
            module: module.to_string(),
            reason: e.to_string(),
        })?;
        info!(module, files = copied, target = %target.display(), "发布模块资源");
        Ok(copied)
    }

    fn remove(&self, module: &str) -> Result<()> {
        let target = self.target_dir(module);
        if target.exists() {
            std::fs::remove_dir_all(&target).map_err(|e| CoreError::AssetPublishFailed {
                module: module.to_string(),
                reason: e.to_string(),
            })?;
            info!(module, target = %target.display(), "删除模块资源");
        }
        Ok(())
    }
}
