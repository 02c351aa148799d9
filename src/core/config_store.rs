//! 共享配置存储
//!
//! 以 JSON 树保存运行期配置，支持点分路径读写（如 `blog.posts.per_page`）。
//! 每个模块通过 [`ModuleSettings`](crate::module::ModuleSettings)
//! 访问以模块名小写为根的命名空间。
//!
//! 写入只在进程生命周期内有效，除非调用方自行持久化。

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::RwLock;

use crate::core::config::is_json;
use crate::utils::{CoreError, Result};

/// 共享配置存储
#[derive(Debug)]
pub struct ConfigStore {
    root: RwLock<Value>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// 创建空的配置存储
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }

    /// 以给定的 JSON 树创建
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidConfigValue {
                key: "<root>".to_string(),
                reason: "配置根节点必须是对象".to_string(),
            });
        }
        Ok(Self {
            root: RwLock::new(value),
        })
    }

    /// 从 YAML / JSON 文件加载，文件中的键覆盖已有的同名键
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        let value: Value = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        let Value::Object(entries) = value else {
            return Err(CoreError::ConfigLoadFailed(format!(
                "{}: 配置根节点必须是对象",
                path.display()
            )));
        };

        let mut root = self.write();
        let target = ensure_object(&mut root);
        for (key, value) in entries {
            target.insert(key, value);
        }
        Ok(())
    }

    /// 读取点分路径上的原始值
    pub fn get_value(&self, path: &str) -> Option<Value> {
        let root = self.read();
        lookup(&root, path).cloned()
    }

    /// 读取并反序列化点分路径上的值，类型不匹配时返回 None
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get_value(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// 路径是否存在
    pub fn has(&self, path: &str) -> bool {
        let root = self.read();
        lookup(&root, path).is_some()
    }

    /// 写入点分路径，沿途缺失或非对象的节点会被替换为对象
    pub fn set(&self, path: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut root = self.write();
        *slot(&mut root, path) = value;
        Ok(())
    }

    /// 删除点分路径上的值
    pub fn remove(&self, path: &str) -> Option<Value> {
        let mut root = self.write();
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (lookup_mut(&mut root, parent)?, last),
            None => (&mut *root, path),
        };
        parent.as_object_mut()?.remove(last)
    }

    /// 将 `partial` 的顶层键浅合并到路径处的对象中
    pub fn merge_object(&self, path: &str, partial: Map<String, Value>) {
        let mut root = self.write();
        let target = ensure_object(slot(&mut root, path));
        for (key, value) in partial {
            target.insert(key, value);
        }
    }

    /// 以 `defaults` 填补路径处缺失的键，已存在的值保持不变
    pub fn merge_defaults(&self, path: &str, defaults: &Value) {
        let mut root = self.write();
        fill_missing(slot(&mut root, path), defaults);
    }

    /// 当前完整配置树的快照
    pub fn snapshot(&self) -> Value {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Value> {
        self.root.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Value> {
        self.root.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}

/// 返回路径对应的可写位置，必要时创建中间对象
fn slot<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    if path.is_empty() {
        return root;
    }
    path.split('.').fold(root, |node, segment| {
        ensure_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null)
    })
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn fill_missing(target: &mut Value, defaults: &Value) {
    match (target, defaults) {
        (Value::Object(existing), Value::Object(defaults)) => {
            for (key, default) in defaults {
                match existing.get_mut(key) {
                    Some(current) => fill_missing(current, default),
                    None => {
                        existing.insert(key.clone(), default.clone());
                    }
                }
            }
        }
        (empty @ Value::Null, default) => *empty = default.clone(),
        _ => {}
    }
}
