//! 钩子注册表
//!
//! 按钩子名保存带优先级的回调列表。优先级数字越小越先执行，
//! 同优先级保持注册顺序。执行时所有回调收到相同的参数，
//! 返回值取最后一个执行的回调（"后写者胜"的过滤链）。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::utils::Result;

/// 默认优先级
pub const DEFAULT_PRIORITY: i32 = 10;

/// 生命周期钩子名称
pub mod lifecycle_hooks {
    /// 启用前，失败时中止启用
    pub const BEFORE_ENABLE: &str = "before_enable";
    /// 启用后
    pub const AFTER_ENABLE: &str = "after_enable";
    /// 停用前，失败时中止停用
    pub const BEFORE_DISABLE: &str = "before_disable";
    /// 停用后
    pub const AFTER_DISABLE: &str = "after_disable";
    /// 安装前，在迁移之前执行
    pub const BEFORE_INSTALL: &str = "before_install";
    /// 安装并启用后
    pub const AFTER_INSTALL: &str = "after_install";
    /// 卸载前，在停用之前执行
    pub const BEFORE_UNINSTALL: &str = "before_uninstall";
    /// 卸载清理完成后
    pub const AFTER_UNINSTALL: &str = "after_uninstall";
}

/// 钩子回调
pub type HookCallback = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
struct HookEntry {
    callback: HookCallback,
    priority: i32,
}

/// 钩子注册表
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<HookEntry>>,
}

impl HookRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 以默认优先级注册回调
    pub fn register<F>(&mut self, name: &str, callback: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_with_priority(name, callback, DEFAULT_PRIORITY);
    }

    /// 注册回调并按优先级重新排序
    pub fn register_with_priority<F>(&mut self, name: &str, callback: F, priority: i32)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let entries = self.hooks.entry(name.to_string()).or_default();
        entries.push(HookEntry {
            callback: Arc::new(callback),
            priority,
        });
        // sort_by_key 是稳定排序，同优先级保持注册顺序
        entries.sort_by_key(|entry| entry.priority);
    }

    /// 执行钩子
    ///
    /// 未注册任何回调时返回 `Ok(None)`。任一回调失败立即中止后续回调并返回错误。
    pub fn execute(&self, name: &str, args: &[Value]) -> Result<Option<Value>> {
        let Some(entries) = self.hooks.get(name) else {
            return Ok(None);
        };

        let mut last = None;
        for entry in entries {
            last = Some((entry.callback)(args)?);
        }
        Ok(last)
    }

    /// 是否注册了指定钩子
    pub fn has(&self, name: &str) -> bool {
        self.hooks.get(name).map(|e| !e.is_empty()).unwrap_or(false)
    }

    /// 清除指定钩子的所有回调
    pub fn clear(&mut self, name: &str) {
        self.hooks.remove(name);
    }

    /// 当前已注册的钩子名称（按名称排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.keys().cloned().collect();
        names.sort();
        names
    }

    /// 指定钩子的回调数量
    pub fn callback_count(&self, name: &str) -> usize {
        self.hooks.get(name).map(Vec::len).unwrap_or(0)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .hooks
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.len()))
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}
