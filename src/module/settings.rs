//! 模块配置访问器
//!
//! 每个模块持有一个 [`ModuleSettings`]，所有读写都落在共享配置存储中
//! 以模块名小写为根的命名空间下。

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::ConfigStore;
use crate::utils::Result;

/// 模块配置访问器
#[derive(Debug, Clone)]
pub struct ModuleSettings {
    store: Arc<ConfigStore>,
    namespace: String,
}

impl ModuleSettings {
    /// 为模块创建访问器，命名空间取模块名小写
    pub fn new(store: Arc<ConfigStore>, module_name: &str) -> Self {
        Self {
            store,
            namespace: module_name.to_lowercase(),
        }
    }

    /// 命名空间
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn path(&self, key: &str) -> String {
        if key.is_empty() {
            self.namespace.clone()
        } else {
            format!("{}.{}", self.namespace, key)
        }
    }

    /// 读取配置，不存在时返回 `default`
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.store.get_value(&self.path(key)).unwrap_or(default)
    }

    /// 读取并反序列化配置
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.get(&self.path(key))
    }

    /// 运行期写入配置
    pub fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        self.store.set(&self.path(key), value)
    }

    /// 配置是否存在
    pub fn has(&self, key: &str) -> bool {
        self.store.has(&self.path(key))
    }

    /// 命名空间下的全部配置
    pub fn all(&self) -> Map<String, Value> {
        match self.store.get_value(&self.namespace) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// 浅合并：新增或覆盖 `partial` 中的键，其余键保留
    pub fn merge(&self, partial: Map<String, Value>) {
        self.store.merge_object(&self.namespace, partial);
    }

    /// 以清单中的默认配置填补缺失项，应用配置中已有的值优先
    pub(crate) fn seed_defaults(&self, defaults: &Map<String, Value>) {
        if defaults.is_empty() {
            return;
        }
        self.store
            .merge_defaults(&self.namespace, &Value::Object(defaults.clone()));
    }
}
