//! 模块数据迁移
//!
//! 安装时执行模块 `migrations/` 目录下尚未执行的迁移，卸载时逆序回滚。
//! 迁移按文件名字典序执行。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::utils::{CoreError, Result};

/// 迁移执行器接口
pub trait SchemaMigrator: Send + Sync {
    /// 执行模块尚未执行的迁移，返回本次执行的迁移名
    fn migrate(&self, module: &str, dir: &Path) -> Result<Vec<String>>;

    /// 回滚模块已执行的迁移，返回本次回滚的迁移名
    fn rollback(&self, module: &str, dir: &Path) -> Result<Vec<String>>;
}

/// 不执行任何迁移
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMigrator;

impl SchemaMigrator for NoopMigrator {
    fn migrate(&self, _module: &str, _dir: &Path) -> Result<Vec<String>> {
        Ok(vec![])
    }

    fn rollback(&self, _module: &str, _dir: &Path) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

/// 台账迁移执行器
///
/// 只维护台账，不执行任何数据库结构变更：迁移文件被检查可读后，文件名记入
/// JSON 台账（模块名 -> 迁移名列表，按执行顺序）。需要真正变更结构时，
/// 实现自己的 [`SchemaMigrator`]。
///
/// 台账先写盘，成功后才更新内存，写盘失败时内存保持原样。
#[derive(Debug)]
pub struct LedgerMigrator {
    path: PathBuf,
    ledger: Mutex<BTreeMap<String, Vec<String>>>,
}

impl LedgerMigrator {
    /// 打开台账文件，不存在时视为空台账
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// 模块已执行的迁移
    pub fn applied(&self, module: &str) -> Vec<String> {
        self.ledger
            .lock()
            .map(|ledger| ledger.get(module).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn flush(&self, ledger: &BTreeMap<String, Vec<String>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(ledger)?)?;
        Ok(())
    }

    fn list_migrations(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl SchemaMigrator for LedgerMigrator {
    fn migrate(&self, module: &str, dir: &Path) -> Result<Vec<String>> {
        if !dir.is_dir() {
            debug!(module, path = %dir.display(), "没有迁移目录，跳过");
            return Ok(vec![]);
        }

        let failed = |reason: String| CoreError::MigrationFailed {
            module: module.to_string(),
            reason,
        };
        let available = Self::list_migrations(dir).map_err(|e| failed(e.to_string()))?;

        let mut ledger = self
            .ledger
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        let mut applied = ledger.get(module).cloned().unwrap_or_default();
        let pending: Vec<String> = available
            .into_iter()
            .filter(|name| !applied.contains(name))
            .collect();

        if pending.is_empty() {
            return Ok(vec![]);
        }

        for name in &pending {
            // 迁移文件必须可读
            std::fs::read(dir.join(name)).map_err(|e| failed(format!("{}: {}", name, e)))?;
            applied.push(name.clone());
        }

        let mut next = ledger.clone();
        next.insert(module.to_string(), applied);
        self.flush(&next).map_err(|e| failed(e.to_string()))?;
        *ledger = next;

        for name in &pending {
            info!(module, migration = %name, "记录迁移");
        }
        Ok(pending)
    }

    fn rollback(&self, module: &str, _dir: &Path) -> Result<Vec<String>> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        if !ledger.contains_key(module) {
            return Ok(vec![]);
        }

        let mut next = ledger.clone();
        let applied = next.remove(module).unwrap_or_default();
        self.flush(&next).map_err(|e| CoreError::MigrationFailed {
            module: module.to_string(),
            reason: e.to_string(),
        })?;
        *ledger = next;

        let rolled_back: Vec<String> = applied.into_iter().rev().collect();
        for name in &rolled_back {
            info!(module, migration = %name, "回滚迁移");
        }
        Ok(rolled_back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_migrate_applies_in_order_once() {
        let dir = tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("002_add_tags.sql"), "ALTER").unwrap();
        std::fs::write(migrations.join("001_create_posts.sql"), "CREATE").unwrap();

        let migrator = LedgerMigrator::open(dir.path().join("ledger.json")).unwrap();
        let applied = migrator.migrate("Blog", &migrations).unwrap();
        assert_eq!(applied, vec!["001_create_posts.sql", "002_add_tags.sql"]);

        // 第二次没有待执行的迁移
        assert!(migrator.migrate("Blog", &migrations).unwrap().is_empty());

        std::fs::write(migrations.join("003_add_index.sql"), "INDEX").unwrap();
        assert_eq!(migrator.migrate("Blog", &migrations).unwrap(), vec!["003_add_index.sql"]);
    }

    #[test]
    fn test_rollback_reverses_and_persists() {
        let dir = tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("001_a.sql"), "").unwrap();
        std::fs::write(migrations.join("002_b.sql"), "").unwrap();
        let ledger_path = dir.path().join("ledger.json");

        let migrator = LedgerMigrator::open(&ledger_path).unwrap();
        migrator.migrate("Blog", &migrations).unwrap();

        let reopened = LedgerMigrator::open(&ledger_path).unwrap();
        assert_eq!(reopened.applied("Blog").len(), 2);

        let rolled = reopened.rollback("Blog", &migrations).unwrap();
        assert_eq!(rolled, vec!["002_b.sql", "001_a.sql"]);
        assert!(reopened.applied("Blog").is_empty());
    }

    #[test]
    fn test_failed_flush_leaves_ledger_untouched() {
        let dir = tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("001.sql"), "").unwrap();

        // 台账的父目录是普通文件，写盘必然失败
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let migrator = LedgerMigrator::open(blocked.join("ledger.json")).unwrap();

        assert!(migrator.migrate("Blog", &migrations).is_err());
        assert!(migrator.applied("Blog").is_empty());
        // 重试仍然看到待执行的迁移
        assert!(migrator.migrate("Blog", &migrations).is_err());
    }

    #[test]
    fn test_failed_rollback_keeps_entries() {
        let dir = tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        std::fs::write(migrations.join("001.sql"), "").unwrap();
        let ledger_dir = dir.path().join("storage");
        let migrator = LedgerMigrator::open(ledger_dir.join("ledger.json")).unwrap();
        migrator.migrate("Blog", &migrations).unwrap();

        // 把台账目录换成普通文件
        std::fs::remove_dir_all(&ledger_dir).unwrap();
        std::fs::write(&ledger_dir, "").unwrap();

        assert!(migrator.rollback("Blog", &migrations).is_err());
        assert_eq!(migrator.applied("Blog"), vec!["001.sql".to_string()]);
    }

    #[test]
    fn test_missing_directory_is_noop() {
        let dir = tempdir().unwrap();
        let migrator = LedgerMigrator::open(dir.path().join("ledger.json")).unwrap();
        assert!(migrator.migrate("Blog", &dir.path().join("nope")).unwrap().is_empty());
        assert!(migrator.rollback("Blog", &dir.path().join("nope")).unwrap().is_empty());
    }
}
