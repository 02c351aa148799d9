//! 模块管理器
//!
//! 进程内的模块注册表。每次启动由加载器重新填充，
//! 启用状态以记录存储为准。管理器在调用模块的状态转换之前执行依赖守卫：
//!
//! - 启用、安装：所有依赖必须已注册且已启用；
//! - 停用、卸载：不能有已启用的模块依赖它。
//!
//! 找不到模块时返回 `Ok(false)`，守卫失败时返回错误。

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use super::dependency::DependencyGraph;
use super::descriptor::{ModuleDescriptor, ModuleInfo, ModuleRecord};
use super::lifecycle::{LifecycleAction, LifecycleReport, Module, ModuleBehavior};
use super::services::ModuleServices;
use crate::utils::{CoreError, Result};

/// 模块管理器
#[derive(Debug)]
pub struct ModuleManager {
    services: ModuleServices,
    /// 注册顺序
    order: Vec<String>,
    modules: HashMap<String, Module>,
    graph: DependencyGraph,
}

impl ModuleManager {
    /// 创建空的管理器
    pub fn new(services: ModuleServices) -> Self {
        Self {
            services,
            order: Vec::new(),
            modules: HashMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// 共享服务
    pub fn services(&self) -> &ModuleServices {
        &self.services
    }

    // ==================== 注册 ====================

    /// 注册模块，同名模块会被覆盖
    ///
    /// 依赖关系构成环时拒绝注册。注册后把描述镜像到记录存储，
    /// 已有记录的启用状态保持不变。
    #[instrument(skip_all, fields(module = %module.name()))]
    pub fn register(&mut self, module: Module) -> Result<()> {
        let name = module.name().to_string();
        let dependencies = module.descriptor().dependencies.clone();

        if let Some(cycle) = self.graph.cycle_with(&name, &dependencies) {
            warn!(cycle = ?cycle, "拒绝注册：循环依赖");
            return Err(CoreError::CircularDependency(cycle.join(" -> ")));
        }

        self.graph.clear_dependencies(&name);
        self.graph.add_module(&name);
        for dep in &dependencies {
            self.graph.add_dependency(&name, dep);
        }

        self.mirror_descriptor(module.descriptor());

        if self.modules.insert(name.clone(), module).is_some() {
            debug!("覆盖已注册的模块");
        } else {
            self.order.push(name);
        }
        info!(dependencies = ?dependencies, "注册模块");
        Ok(())
    }

    /// 以描述和行为构造并注册模块
    pub fn register_behavior(
        &mut self,
        descriptor: ModuleDescriptor,
        root_path: Option<PathBuf>,
        behavior: Box<dyn ModuleBehavior>,
    ) -> Result<()> {
        let mut module = Module::new(descriptor, behavior, self.services.clone());
        if let Some(root) = root_path {
            module = module.with_root_path(root);
        }
        self.register(module)
    }

    fn mirror_descriptor(&self, descriptor: &ModuleDescriptor) {
        let result = self.services.store.find(&descriptor.name).and_then(|existing| {
            let enabled = existing.map(|r| r.enabled).unwrap_or(descriptor.enabled);
            self.services
                .store
                .upsert(ModuleRecord::from_descriptor(descriptor, enabled))
        });
        if let Err(e) = result {
            warn!(module = %descriptor.name, error = %e, "写入模块记录失败");
        }
    }

    fn mirror(&self, name: &str) {
        let Some(module) = self.modules.get(name) else {
            return;
        };
        if let Err(e) = self.services.store.upsert(module.record()) {
            warn!(module = %name, error = %e, "写入模块记录失败");
        }
    }

    // ==================== 查询 ====================

    /// 所有模块，按注册顺序
    pub fn all(&self) -> Vec<&Module> {
        self.order
            .iter()
            .filter_map(|name| self.modules.get(name))
            .collect()
    }

    /// 已启用的模块
    pub fn enabled(&self) -> Vec<&Module> {
        self.all().into_iter().filter(|m| m.is_enabled()).collect()
    }

    /// 已停用的模块
    pub fn disabled(&self) -> Vec<&Module> {
        self.all().into_iter().filter(|m| !m.is_enabled()).collect()
    }

    /// 按名称获取模块
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// 按名称获取可变模块
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    /// 是否已注册
    pub fn has(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// 已注册的模块数量
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// 是否没有注册任何模块
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// 模块信息，启用状态为实时值
    pub fn module_info(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.get(name).map(Module::info)
    }

    /// 所有模块信息，按注册顺序
    pub fn all_modules_info(&self) -> Vec<ModuleInfo> {
        self.all().into_iter().map(Module::info).collect()
    }

    /// 声明依赖指定模块的已注册模块
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.graph
            .dependents_of(name)
            .into_iter()
            .filter(|dependent| self.has(dependent))
            .collect()
    }

    /// 已注册模块的启用顺序，依赖在前
    pub fn load_order(&self) -> Result<Vec<String>> {
        Ok(self
            .graph
            .load_order()?
            .into_iter()
            .filter(|name| self.has(name))
            .collect())
    }

    // ==================== 依赖守卫 ====================

    /// 未注册或未启用的依赖
    pub fn unmet_dependencies(&self, name: &str) -> Vec<String> {
        let Some(module) = self.modules.get(name) else {
            return vec![];
        };
        module
            .descriptor()
            .dependencies
            .iter()
            .filter(|dep| !self.modules.get(*dep).map(Module::is_enabled).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// 依赖指定模块且已启用的模块，按注册顺序
    pub fn active_dependents(&self, name: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|m| m.descriptor().depends_on(name) && m.is_enabled())
            .map(|m| m.name().to_string())
            .collect()
    }

    fn guard(&self, name: &str, action: LifecycleAction) -> Result<()> {
        match action {
            LifecycleAction::Enable | LifecycleAction::Install => {
                let missing = self.unmet_dependencies(name);
                if !missing.is_empty() {
                    warn!(module = %name, %action, missing = ?missing, "依赖未满足");
                    return Err(CoreError::DependencyUnmet {
                        module: name.to_string(),
                        missing,
                    });
                }
            }
            LifecycleAction::Disable | LifecycleAction::Uninstall => {
                let dependents = self.active_dependents(name);
                if !dependents.is_empty() {
                    warn!(module = %name, %action, dependents = ?dependents, "仍有已启用的模块依赖它");
                    return Err(CoreError::DependentsActive {
                        module: name.to_string(),
                        dependents,
                    });
                }
            }
        }
        Ok(())
    }

    // ==================== 状态转换 ====================

    /// 执行状态转换并返回报告，找不到模块时返回 `Ok(None)`
    #[instrument(skip_all, fields(module = %name, action = %action))]
    pub fn transition(&mut self, name: &str, action: LifecycleAction) -> Result<Option<LifecycleReport>> {
        if !self.has(name) {
            warn!("模块不存在");
            return Ok(None);
        }
        self.guard(name, action)?;

        let Some(module) = self.modules.get_mut(name) else {
            return Ok(None);
        };
        let report = match action {
            LifecycleAction::Enable => module.enable()?,
            LifecycleAction::Disable => module.disable()?,
            LifecycleAction::Install => module.install()?,
            LifecycleAction::Uninstall => module.uninstall()?,
        };

        self.mirror(name);
        Ok(Some(report))
    }

    /// 启用模块
    pub fn enable(&mut self, name: &str) -> Result<bool> {
        Ok(self.transition(name, LifecycleAction::Enable)?.is_some())
    }

    /// 停用模块
    pub fn disable(&mut self, name: &str) -> Result<bool> {
        Ok(self.transition(name, LifecycleAction::Disable)?.is_some())
    }

    /// 安装模块
    pub fn install(&mut self, name: &str) -> Result<bool> {
        Ok(self.transition(name, LifecycleAction::Install)?.is_some())
    }

    /// 卸载模块
    pub fn uninstall(&mut self, name: &str) -> Result<bool> {
        Ok(self.transition(name, LifecycleAction::Uninstall)?.is_some())
    }
}
