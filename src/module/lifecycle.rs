//! 模块生命周期
//!
//! [`Module`] 组合了模块描述、钩子注册表、配置访问器和模块自身的行为，
//! 负责安装、启用、停用、卸载四种状态转换。
//!
//! 失败策略并不对称：
//! - 安装时迁移失败、`on_install` 失败、`on_enable` 失败都会返回错误；
//! - `on_disable` 失败、资源发布失败、卸载时的回滚和资源清理失败、
//!   事件分发失败、启用状态写入失败都只记录日志，并登记在 [`LifecycleReport`] 中。
//!
//! 启用状态不保存在模块上，而是每次从记录存储中读取。

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::descriptor::{ModuleDescriptor, ModuleInfo, ModuleRecord};
use super::events::ModuleEvent;
use super::hooks::{lifecycle_hooks, HookRegistry};
use super::services::ModuleServices;
use super::settings::ModuleSettings;
use crate::utils::{CoreError, Result};

/// 迁移文件目录（相对模块根目录）
pub const MIGRATIONS_DIR: &str = "migrations";

/// 静态资源目录（相对模块根目录）
pub const ASSETS_DIR: &str = "assets";

/// 生命周期回调可见的模块上下文
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    /// 模块描述
    pub descriptor: &'a ModuleDescriptor,
    /// 模块配置
    pub settings: &'a ModuleSettings,
    /// 模块根目录
    pub root_path: Option<&'a Path>,
}

/// 模块行为
///
/// 每种模块实现自己的生命周期回调，默认全部为空操作。
pub trait ModuleBehavior: Send + Sync {
    /// 模块构造时注册钩子
    fn register_hooks(&self, _hooks: &mut HookRegistry) {}

    /// 安装回调，失败会中止安装
    fn on_install(&mut self, _ctx: &ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 启用回调，失败会返回给调用方，但不会回滚
    fn on_enable(&mut self, _ctx: &ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 停用回调，失败只记录日志
    fn on_disable(&mut self, _ctx: &ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 卸载回调
    fn on_uninstall(&mut self, _ctx: &ModuleContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// 没有任何回调的模块行为，用于只有清单的模块
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestOnly;

impl ModuleBehavior for ManifestOnly {}

/// 生命周期动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// 安装
    Install,
    /// 启用
    Enable,
    /// 停用
    Disable,
    /// 卸载
    Uninstall,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleAction::Install => "install",
            LifecycleAction::Enable => "enable",
            LifecycleAction::Disable => "disable",
            LifecycleAction::Uninstall => "uninstall",
        };
        write!(f, "{}", s)
    }
}

/// 状态转换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// 已执行
    Applied,
    /// 已处于目标状态，未执行
    Skipped,
}

/// 被吸收的非致命失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsorbedFailure {
    /// 失败阶段
    pub stage: String,
    /// 失败原因
    pub message: String,
}

/// 一次状态转换的报告
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleReport {
    /// 模块名称
    pub module: String,
    /// 动作
    pub action: LifecycleAction,
    /// 结果
    pub outcome: TransitionOutcome,
    /// 非致命失败
    pub absorbed: Vec<AbsorbedFailure>,
}

impl LifecycleReport {
    fn new(module: &str, action: LifecycleAction) -> Self {
        Self {
            module: module.to_string(),
            action,
            outcome: TransitionOutcome::Applied,
            absorbed: vec![],
        }
    }

    fn skipped(module: &str, action: LifecycleAction) -> Self {
        Self {
            outcome: TransitionOutcome::Skipped,
            ..Self::new(module, action)
        }
    }

    fn absorb(&mut self, stage: &str, err: &CoreError) {
        warn!(module = %self.module, stage, error = %err, "非致命失败已忽略");
        self.absorbed.push(AbsorbedFailure {
            stage: stage.to_string(),
            message: err.to_string(),
        });
    }

    fn extend(&mut self, nested: LifecycleReport) {
        self.absorbed.extend(nested.absorbed);
    }

    /// 是否实际执行了转换
    pub fn applied(&self) -> bool {
        self.outcome == TransitionOutcome::Applied
    }

    /// 是否没有任何非致命失败
    pub fn is_clean(&self) -> bool {
        self.absorbed.is_empty()
    }

    /// 指定阶段是否有非致命失败
    pub fn has_failure(&self, stage: &str) -> bool {
        self.absorbed.iter().any(|f| f.stage == stage)
    }
}

/// 报告中的阶段名称
pub mod stages {
    /// 启用状态写入
    pub const PERSIST: &str = "persist";
    /// 事件分发
    pub const EVENT: &str = "event";
    /// 停用回调
    pub const ON_DISABLE: &str = "on_disable";
    /// 资源发布
    pub const PUBLISH_ASSETS: &str = "publish_assets";
    /// 迁移回滚
    pub const ROLLBACK: &str = "rollback";
    /// 资源删除
    pub const REMOVE_ASSETS: &str = "remove_assets";
}

/// 模块
pub struct Module {
    descriptor: ModuleDescriptor,
    root_path: Option<PathBuf>,
    hooks: HookRegistry,
    settings: ModuleSettings,
    behavior: Box<dyn ModuleBehavior>,
    services: ModuleServices,
}

impl Module {
    /// 创建模块
    ///
    /// 清单中的默认配置写入共享配置存储，已有的应用配置优先。
    pub fn new(
        descriptor: ModuleDescriptor,
        behavior: Box<dyn ModuleBehavior>,
        services: ModuleServices,
    ) -> Self {
        let settings = ModuleSettings::new(services.config.clone(), &descriptor.name);
        settings.seed_defaults(&descriptor.config);

        let mut hooks = HookRegistry::new();
        behavior.register_hooks(&mut hooks);

        debug!(module = %descriptor.name, hooks = ?hooks.names(), "构造模块");
        Self {
            descriptor,
            root_path: None,
            hooks,
            settings,
            behavior,
            services,
        }
    }

    /// 设置模块根目录
    pub fn with_root_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root.into());
        self
    }

    /// 模块名称
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// 模块描述
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// 模块根目录
    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    /// 钩子注册表
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// 可变钩子注册表
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// 配置访问器
    pub fn settings(&self) -> &ModuleSettings {
        &self.settings
    }

    /// 是否启用
    ///
    /// 以记录存储为准，没有记录或读取失败时取描述中的默认值。
    pub fn is_enabled(&self) -> bool {
        match self.services.store.find(&self.descriptor.name) {
            Ok(Some(record)) => record.enabled,
            Ok(None) => self.descriptor.enabled,
            Err(e) => {
                warn!(module = %self.descriptor.name, error = %e, "读取模块记录失败，使用默认启用状态");
                self.descriptor.enabled
            }
        }
    }

    /// 当前状态的持久化记录
    pub fn record(&self) -> ModuleRecord {
        ModuleRecord::from_descriptor(&self.descriptor, self.is_enabled())
    }

    /// 模块信息
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.descriptor.name.clone(),
            version: self.descriptor.version.clone(),
            description: self.descriptor.description.clone(),
            dependencies: self.descriptor.dependencies.clone(),
            enabled: self.is_enabled(),
            config: self.settings.all(),
            path: self.root_path.clone(),
            hooks: self.hooks.names(),
        }
    }

    fn run_hook(&self, name: &str) -> Result<()> {
        let args = [Value::String(self.descriptor.name.clone())];
        self.hooks.execute(name, &args).map(|_| ()).map_err(|e| {
            error!(module = %self.descriptor.name, hook = name, error = %e, "钩子执行失败");
            CoreError::HookFailed {
                hook: name.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn callback_failed(&self, stage: &str, err: CoreError) -> CoreError {
        error!(module = %self.descriptor.name, stage, error = %err, "生命周期回调失败");
        CoreError::LifecycleFailed {
            module: self.descriptor.name.clone(),
            stage: stage.to_string(),
            reason: err.to_string(),
        }
    }

    fn persist_enabled(&mut self, enabled: bool) -> Result<()> {
        self.descriptor.enabled = enabled;
        let record = match self.services.store.find(&self.descriptor.name)? {
            Some(mut existing) => {
                existing.enabled = enabled;
                existing.updated_at = chrono::Utc::now();
                existing
            }
            None => ModuleRecord::from_descriptor(&self.descriptor, enabled),
        };
        self.services.store.upsert(record)
    }

    fn dispatch(&self, event: ModuleEvent, report: &mut LifecycleReport) {
        if let Err(e) = self.services.events.dispatch(&event) {
            report.absorb(stages::EVENT, &e);
        }
    }

    fn module_dir(&self, sub: &str) -> Option<PathBuf> {
        self.root_path.as_ref().map(|root| root.join(sub))
    }

    /// 启用模块
    ///
    /// 已启用时直接返回 [`TransitionOutcome::Skipped`]，不触发任何钩子。
    pub fn enable(&mut self) -> Result<LifecycleReport> {
        let name = self.descriptor.name.clone();
        if self.is_enabled() {
            info!(module = %name, "模块已启用，跳过");
            return Ok(LifecycleReport::skipped(&name, LifecycleAction::Enable));
        }

        let mut report = LifecycleReport::new(&name, LifecycleAction::Enable);
        self.run_hook(lifecycle_hooks::BEFORE_ENABLE)?;

        let ctx = ModuleContext {
            descriptor: &self.descriptor,
            settings: &self.settings,
            root_path: self.root_path.as_deref(),
        };
        if let Err(e) = self.behavior.on_enable(&ctx) {
            return Err(self.callback_failed("on_enable", e));
        }

        if let Err(e) = self.persist_enabled(true) {
            report.absorb(stages::PERSIST, &e);
        }
        self.dispatch(ModuleEvent::enabled(&name), &mut report);
        self.run_hook(lifecycle_hooks::AFTER_ENABLE)?;

        info!(module = %name, "模块已启用");
        Ok(report)
    }

    /// 停用模块
    ///
    /// `on_disable` 失败不会阻止停用。
    pub fn disable(&mut self) -> Result<LifecycleReport> {
        let name = self.descriptor.name.clone();
        if !self.is_enabled() {
            info!(module = %name, "模块已停用，跳过");
            return Ok(LifecycleReport::skipped(&name, LifecycleAction::Disable));
        }

        let mut report = LifecycleReport::new(&name, LifecycleAction::Disable);
        self.run_hook(lifecycle_hooks::BEFORE_DISABLE)?;

        let ctx = ModuleContext {
            descriptor: &self.descriptor,
            settings: &self.settings,
            root_path: self.root_path.as_deref(),
        };
        if let Err(e) = self.behavior.on_disable(&ctx) {
            report.absorb(stages::ON_DISABLE, &e);
        }

        if let Err(e) = self.persist_enabled(false) {
            report.absorb(stages::PERSIST, &e);
        }
        self.dispatch(ModuleEvent::disabled(&name), &mut report);
        self.run_hook(lifecycle_hooks::AFTER_DISABLE)?;

        info!(module = %name, "模块已停用");
        Ok(report)
    }

    /// 安装模块
    ///
    /// 执行迁移、发布资源、调用 `on_install`，最后启用模块。
    pub fn install(&mut self) -> Result<LifecycleReport> {
        let name = self.descriptor.name.clone();
        let mut report = LifecycleReport::new(&name, LifecycleAction::Install);
        info!(module = %name, "开始安装模块");

        self.run_hook(lifecycle_hooks::BEFORE_INSTALL)?;

        if let Some(dir) = self.module_dir(MIGRATIONS_DIR) {
            match self.services.migrator.migrate(&name, &dir) {
                Ok(applied) => debug!(module = %name, migrations = ?applied, "迁移完成"),
                Err(e) => {
                    error!(module = %name, error = %e, "迁移失败，中止安装");
                    return Err(match e {
                        CoreError::MigrationFailed { .. } => e,
                        other => CoreError::MigrationFailed {
                            module: name.clone(),
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }

        if let Some(dir) = self.module_dir(ASSETS_DIR) {
            if let Err(e) = self.services.assets.publish(&name, &dir) {
                report.absorb(stages::PUBLISH_ASSETS, &e);
            }
        }

        let ctx = ModuleContext {
            descriptor: &self.descriptor,
            settings: &self.settings,
            root_path: self.root_path.as_deref(),
        };
        if let Err(e) = self.behavior.on_install(&ctx) {
            return Err(self.callback_failed("on_install", e));
        }

        let enabled = self.enable()?;
        report.extend(enabled);

        self.run_hook(lifecycle_hooks::AFTER_INSTALL)?;
        info!(module = %name, absorbed = report.absorbed.len(), "模块安装完成");
        Ok(report)
    }

    /// 卸载模块
    ///
    /// 先停用，再回滚迁移、删除资源，清理步骤失败不会中止卸载。
    pub fn uninstall(&mut self) -> Result<LifecycleReport> {
        let name = self.descriptor.name.clone();
        let mut report = LifecycleReport::new(&name, LifecycleAction::Uninstall);
        info!(module = %name, "开始卸载模块");

        self.run_hook(lifecycle_hooks::BEFORE_UNINSTALL)?;

        let disabled = self.disable()?;
        report.extend(disabled);

        if let Some(dir) = self.module_dir(MIGRATIONS_DIR) {
            match self.services.migrator.rollback(&name, &dir) {
                Ok(rolled) => debug!(module = %name, migrations = ?rolled, "迁移已回滚"),
                Err(e) => report.absorb(stages::ROLLBACK, &e),
            }
        }

        if let Err(e) = self.services.assets.remove(&name) {
            report.absorb(stages::REMOVE_ASSETS, &e);
        }

        let ctx = ModuleContext {
            descriptor: &self.descriptor,
            settings: &self.settings,
            root_path: self.root_path.as_deref(),
        };
        if let Err(e) = self.behavior.on_uninstall(&ctx) {
            return Err(self.callback_failed("on_uninstall", e));
        }

        self.run_hook(lifecycle_hooks::AFTER_UNINSTALL)?;
        info!(module = %name, absorbed = report.absorbed.len(), "模块卸载完成");
        Ok(report)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("descriptor", &self.descriptor)
            .field("root_path", &self.root_path)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
