//! 外部模块加载器
//!
//! 扫描模块目录，为每个带清单的子目录查找模块工厂，构造模块并注册到管理器。
//! 工厂按约定的键查找，键由命名空间和目录名组成，依次尝试：
//!
//! 1. `{ns}::{Dir}::{Dir}Module`
//! 2. `{ns}::{Dir}::Module`
//! 3. `{ns}::{Dir}Module`
//! 4. `{ns}::{Dir}`
//!
//! 加载过程中的任何失败都只记录日志并跳过该模块，不会中断启动。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use super::descriptor::ModuleDescriptor;
use super::lifecycle::{ManifestOnly, Module, ModuleBehavior};
use super::manager::ModuleManager;
use super::parser::{is_dir, ManifestParser};
use crate::utils::Result;

/// 默认命名空间
pub const DEFAULT_NAMESPACE: &str = "Modules";

/// 依赖包清单文件名
pub const PACKAGE_MANIFEST: &str = "package.json";

/// 依赖包内的模块目录名
pub const PACKAGE_MODULES_DIR: &str = "modules";

/// 模块工厂：由模块描述构造模块行为
pub type ModuleFactory =
    Arc<dyn Fn(&ModuleDescriptor) -> Result<Box<dyn ModuleBehavior>> + Send + Sync>;

/// 模块工厂表
#[derive(Clone, Default)]
pub struct ModuleFactories {
    factories: HashMap<String, ModuleFactory>,
    fallback: Option<ModuleFactory>,
}

impl ModuleFactories {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 找不到工厂时，只有清单的模块以空行为注册
    pub fn with_manifest_fallback(mut self) -> Self {
        self.fallback = Some(Arc::new(|_: &ModuleDescriptor| {
            Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
        }));
        self
    }

    /// 注册工厂
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ModuleDescriptor) -> Result<Box<dyn ModuleBehavior>> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
    }

    /// 是否注册了指定键
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// 按键获取工厂
    pub fn get(&self, key: &str) -> Option<ModuleFactory> {
        self.factories.get(key).cloned()
    }

    /// 已注册的键（排序）
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 目录对应的候选键，按查找顺序
    pub fn candidate_keys(namespace: &str, dir_name: &str) -> Vec<String> {
        vec![
            format!("{ns}::{dir}::{dir}Module", ns = namespace, dir = dir_name),
            format!("{}::{}::Module", namespace, dir_name),
            format!("{}::{}Module", namespace, dir_name),
            format!("{}::{}", namespace, dir_name),
        ]
    }

    /// 按约定查找工厂，找不到时使用兜底工厂
    pub fn resolve(&self, namespace: &str, dir_name: &str) -> Option<(String, ModuleFactory)> {
        for key in Self::candidate_keys(namespace, dir_name) {
            if let Some(factory) = self.factories.get(&key) {
                return Some((key, factory.clone()));
            }
        }
        self.fallback
            .clone()
            .map(|factory| (format!("{}::{}", namespace, dir_name), factory))
    }
}

impl fmt::Debug for ModuleFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactories")
            .field("keys", &self.keys())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    namespace: Option<String>,
}

/// 外部模块加载器
#[derive(Debug)]
pub struct ExternalModuleLoader {
    factories: ModuleFactories,
    loaded_paths: HashSet<PathBuf>,
    default_namespace: String,
}

impl ExternalModuleLoader {
    /// 以工厂表创建加载器
    pub fn new(factories: ModuleFactories) -> Self {
        Self {
            factories,
            loaded_paths: HashSet::new(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// 设置依赖包未声明命名空间时使用的命名空间
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// 依赖包的默认命名空间
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// 工厂表
    pub fn factories(&self) -> &ModuleFactories {
        &self.factories
    }

    /// 路径是否已加载过
    pub fn is_loaded(&self, dir: &Path) -> bool {
        self.loaded_paths.contains(&normalize(dir))
    }

    /// 扫描目录的直接子目录并注册模块，返回本次注册的模块名
    ///
    /// 同一路径只扫描一次，重复调用直接返回空列表。
    pub async fn load_from_path(
        &mut self,
        manager: &mut ModuleManager,
        dir: &Path,
        namespace: &str,
    ) -> Vec<String> {
        let key = normalize(dir);
        if self.loaded_paths.contains(&key) {
            debug!(path = %dir.display(), "目录已加载，跳过");
            return vec![];
        }

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "无法读取模块目录");
                return vec![];
            }
        };
        self.loaded_paths.insert(key);

        let mut roots = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if is_dir(&path).await {
                roots.push(path);
            }
        }
        // 目录遍历顺序与平台有关
        roots.sort();

        let mut registered = Vec::new();
        for root in roots {
            if ManifestParser::manifest_path(&root).await.is_none() {
                trace!(path = %root.display(), "未找到模块清单，跳过");
                continue;
            }
            let Some(dir_name) = root.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let Some((factory_key, factory)) = self.factories.resolve(namespace, &dir_name) else {
                warn!(path = %root.display(), namespace, "找不到模块工厂，跳过");
                continue;
            };
            if let Some(name) = build_and_register(manager, &root, &factory_key, &factory).await {
                registered.push(name);
            }
        }

        info!(path = %dir.display(), namespace, count = registered.len(), "模块目录加载完成");
        registered
    }

    /// 扫描依赖目录 `<vendor>/<组织>/<包>/modules`，返回本次注册的模块名
    ///
    /// 命名空间取包根目录 `package.json` 中的 `namespace`，缺失时使用 [`default_namespace`](Self::default_namespace)。
    pub async fn load_from_vendor(&mut self, manager: &mut ModuleManager, vendor_dir: &Path) -> Vec<String> {
        let mut registered = Vec::new();
        for package in package_dirs(vendor_dir).await {
            let modules_dir = package.join(PACKAGE_MODULES_DIR);
            if !is_dir(&modules_dir).await {
                continue;
            }
            let namespace = package_namespace(&package, &self.default_namespace).await;
            debug!(package = %package.display(), namespace = %namespace, "发现模块包");
            registered.extend(self.load_from_path(manager, &modules_dir, &namespace).await);
        }
        registered
    }

    /// 不经扫描直接注册单个模块
    ///
    /// 路径不存在、没有清单、键没有注册或构造失败时返回 `false`。
    pub async fn register_custom_module(&mut self, manager: &mut ModuleManager, path: &Path, key: &str) -> bool {
        if !is_dir(path).await {
            warn!(path = %path.display(), "模块路径不存在");
            return false;
        }
        let Some(factory) = self.factories.get(key) else {
            warn!(key, "模块工厂未注册");
            return false;
        };
        build_and_register(manager, path, key, &factory).await.is_some()
    }
}

async fn build_and_register(
    manager: &mut ModuleManager,
    root: &Path,
    factory_key: &str,
    factory: &ModuleFactory,
) -> Option<String> {
    let descriptor = match ManifestParser::read_dir(root).await {
        Ok(Some(descriptor)) => descriptor,
        Ok(None) => {
            warn!(path = %root.display(), "未找到模块清单");
            return None;
        }
        Err(e) => {
            warn!(path = %root.display(), error = %e, "模块清单无效");
            return None;
        }
    };

    let behavior = match factory(&descriptor) {
        Ok(behavior) => behavior,
        Err(e) => {
            warn!(module = %descriptor.name, key = factory_key, error = %e, "构造模块失败");
            return None;
        }
    };

    let name = descriptor.name.clone();
    let module = Module::new(descriptor, behavior, manager.services().clone()).with_root_path(root);
    match manager.register(module) {
        Ok(()) => {
            debug!(module = %name, key = factory_key, "加载模块");
            Some(name)
        }
        Err(e) => {
            warn!(module = %name, error = %e, "注册模块失败");
            None
        }
    }
}

async fn package_dirs(vendor_dir: &Path) -> Vec<PathBuf> {
    let mut packages = Vec::new();
    let Ok(mut orgs) = tokio::fs::read_dir(vendor_dir).await else {
        debug!(path = %vendor_dir.display(), "依赖目录不存在");
        return packages;
    };
    while let Ok(Some(org)) = orgs.next_entry().await {
        let org_path = org.path();
        if !is_dir(&org_path).await {
            continue;
        }
        let Ok(mut pkgs) = tokio::fs::read_dir(&org_path).await else {
            continue;
        };
        while let Ok(Some(pkg)) = pkgs.next_entry().await {
            let pkg_path = pkg.path();
            if is_dir(&pkg_path).await {
                packages.push(pkg_path);
            }
        }
    }
    packages.sort();
    packages
}

async fn package_namespace(package: &Path, fallback: &str) -> String {
    let path = package.join(PACKAGE_MANIFEST);
    let manifest = match tokio::fs::read_to_string(&path).await {
        Ok(content) => serde_json::from_str::<PackageManifest>(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "包清单无效，使用默认命名空间");
            PackageManifest::default()
        }),
        Err(_) => PackageManifest::default(),
    };
    manifest
        .namespace
        .filter(|ns| !ns.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn normalize(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
