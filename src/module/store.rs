//! 模块记录存储
//!
//! 持久化每个模块的启用状态和元数据镜像。内存注册表每次启动重建，
//! 只有这里的记录能跨进程重启保留。
//!
//! 写入按记录采用后写者胜，不做跨进程加锁或版本比较：多个进程同时启用/停用
//! 同一模块时，最后一次写入生效。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use super::descriptor::ModuleRecord;
use crate::utils::{CoreError, Result};

/// 模块记录存储接口
pub trait ModuleStore: Send + Sync {
    /// 按模块名查找记录
    fn find(&self, name: &str) -> Result<Option<ModuleRecord>>;

    /// 按模块名创建或更新记录
    fn upsert(&self, record: ModuleRecord) -> Result<()>;

    /// 记录是否存在
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.find(name)?.is_some())
    }

    /// 所有记录
    fn all(&self) -> Result<Vec<ModuleRecord>>;
}

/// 内存记录存储
#[derive(Debug, Default)]
pub struct MemoryModuleStore {
    records: RwLock<HashMap<String, ModuleRecord>>,
}

impl MemoryModuleStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleStore for MemoryModuleStore {
    fn find(&self, name: &str) -> Result<Option<ModuleRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        Ok(records.get(name).cloned())
    }

    fn upsert(&self, record: ModuleRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        records.insert(record.name.clone(), record);
        Ok(())
    }

    fn all(&self) -> Result<Vec<ModuleRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        let mut all: Vec<ModuleRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// JSON 文件记录存储
///
/// 所有记录保存在一个 JSON 文件中。每次读取都直接读文件，写入时重新读取文件、
/// 只替换当前记录后整体重写，其他进程写入的记录不受影响。
#[derive(Debug)]
pub struct JsonFileModuleStore {
    path: PathBuf,
    // 串行化本进程内的读改写
    write_lock: Mutex<()>,
}

impl JsonFileModuleStore {
    /// 打开存储文件，文件不存在时视为空存储
    ///
    /// # Errors
    ///
    /// 文件存在但无法解析时返回错误
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let count = read_records(&path)?.len();

        debug!(path = %path.display(), count, "打开模块记录存储");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// 存储文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, ModuleRecord>> {
        read_records(&self.path).map_err(|e| CoreError::Persistence(e.to_string()))
    }

    fn flush(&self, records: &HashMap<String, ModuleRecord>) -> Result<()> {
        let mut list: Vec<&ModuleRecord> = records.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // 临时文件写完后整体替换
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&list)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<HashMap<String, ModuleRecord>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let list: Vec<ModuleRecord> = serde_json::from_str(&content)?;
    Ok(list.into_iter().map(|r| (r.name.clone(), r)).collect())
}

impl ModuleStore for JsonFileModuleStore {
    fn find(&self, name: &str) -> Result<Option<ModuleRecord>> {
        Ok(self.load()?.remove(name))
    }

    fn upsert(&self, record: ModuleRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| CoreError::Persistence(e.to_string()))?;

        let mut records = self.load()?;
        records.insert(record.name.clone(), record);
        self.flush(&records)
            .map_err(|e| CoreError::Persistence(e.to_string()))
    }

    fn all(&self) -> Result<Vec<ModuleRecord>> {
        let mut all: Vec<ModuleRecord> = self.load()?.into_values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
