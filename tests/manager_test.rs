//! 模块管理器集成测试
//!
//! 测试依赖守卫、实时信息投影和跨重启的启用状态

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chips_modules::{
    BroadcastEventSink, CoreError, JsonFileModuleStore, LifecycleAction, ManifestOnly,
    ModuleBehavior, ModuleContext, ModuleDescriptor, ModuleManager, ModuleRecord, ModuleServices,
    ModuleStore, Result,
};
use chips_modules::module::lifecycle::stages;
use chips_modules::module::module_events;
use tempfile::TempDir;

struct CountingModule {
    enables: Arc<AtomicUsize>,
}

impl ModuleBehavior for CountingModule {
    fn on_enable(&mut self, _ctx: &ModuleContext<'_>) -> Result<()> {
        self.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 写入总是失败的记录存储
struct ReadOnlyStore;

impl ModuleStore for ReadOnlyStore {
    fn find(&self, _name: &str) -> Result<Option<ModuleRecord>> {
        Ok(None)
    }

    fn upsert(&self, record: ModuleRecord) -> Result<()> {
        Err(CoreError::Persistence(format!("只读存储，无法写入 {}", record.name)))
    }

    fn all(&self) -> Result<Vec<ModuleRecord>> {
        Ok(vec![])
    }
}

fn register(manager: &mut ModuleManager, descriptor: ModuleDescriptor) {
    manager
        .register_behavior(descriptor, None, Box::new(ManifestOnly))
        .unwrap();
}

#[test]
fn test_reports_without_core() {
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    register(&mut manager, ModuleDescriptor::new("Reports", "1.0.0").with_dependency("Core"));

    let err = manager.enable("Reports").unwrap_err();
    match err {
        CoreError::DependencyUnmet { module, missing } => {
            assert_eq!(module, "Reports");
            assert_eq!(missing, vec!["Core".to_string()]);
        }
        other => panic!("意外的错误: {:?}", other),
    }

    assert!(!manager.enable("NoSuchModule").unwrap());
    assert!(!manager.install("NoSuchModule").unwrap());
    assert!(!manager.uninstall("NoSuchModule").unwrap());
}

#[test]
fn test_dependency_guard_both_directions() {
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    register(&mut manager, ModuleDescriptor::new("Core", "1.0.0"));
    register(&mut manager, ModuleDescriptor::new("Reports", "1.0.0").with_dependency("Core"));

    assert!(manager.enable("Reports").unwrap_err().is_dependency_guard());
    assert!(manager.install("Reports").unwrap_err().is_dependency_guard());

    assert!(manager.enable("Core").unwrap());
    assert!(manager.enable("Reports").unwrap());

    for result in [manager.disable("Core"), manager.uninstall("Core")] {
        match result {
            Err(CoreError::DependentsActive { dependents, .. }) => {
                assert_eq!(dependents, vec!["Reports".to_string()]);
            }
            other => panic!("意外的结果: {:?}", other),
        }
    }
    assert!(manager.get("Core").unwrap().is_enabled());

    assert!(manager.disable("Reports").unwrap());
    assert!(manager.disable("Core").unwrap());
    assert_eq!(manager.disabled().len(), 2);
}

#[test]
fn test_info_reflects_live_state() {
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0").with_description("博客"));

    assert!(!manager.module_info("Blog").unwrap().enabled);
    manager.enable("Blog").unwrap();
    assert!(manager.module_info("Blog").unwrap().enabled);
    manager.disable("Blog").unwrap();
    assert!(!manager.module_info("Blog").unwrap().enabled);

    // 绕过管理器直接改写记录，信息也跟着变化
    let mut record = manager.services().store.find("Blog").unwrap().unwrap();
    record.enabled = true;
    manager.services().store.upsert(record).unwrap();
    assert!(manager.module_info("Blog").unwrap().enabled);

    let all = manager.all_modules_info();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].description, "博客");
    assert!(manager.module_info("Missing").is_none());
}

#[test]
fn test_enable_is_idempotent_through_manager() {
    let enables = Arc::new(AtomicUsize::new(0));
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    manager
        .register_behavior(
            ModuleDescriptor::new("Blog", "1.0.0"),
            None,
            Box::new(CountingModule { enables: enables.clone() }),
        )
        .unwrap();

    assert!(manager.enable("Blog").unwrap());
    assert!(manager.enable("Blog").unwrap());
    assert_eq!(enables.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mutual_dependency_rejected() {
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    register(&mut manager, ModuleDescriptor::new("Shop", "1.0.0").with_dependency("Cart"));

    let err = manager
        .register_behavior(
            ModuleDescriptor::new("Cart", "1.0.0").with_dependency("Shop"),
            None,
            Box::new(ManifestOnly),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::CircularDependency(ref path) if path.contains("Shop")));
    assert!(!manager.has("Cart"));

    // 依赖列表变化后可以重新注册
    register(&mut manager, ModuleDescriptor::new("Cart", "1.0.0"));
    assert_eq!(manager.load_order().unwrap(), vec!["Cart".to_string(), "Shop".to_string()]);
}

#[test]
fn test_enabled_state_survives_restart() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("modules.json");

    {
        let services = ModuleServices::in_memory()
            .with_store(Arc::new(JsonFileModuleStore::open(&store_path).unwrap()));
        let mut manager = ModuleManager::new(services);
        register(&mut manager, ModuleDescriptor::new("Core", "1.0.0"));
        register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0"));
        manager.enable("Core").unwrap();
    }

    // 新进程重新发现模块，启用状态来自记录存储
    let services = ModuleServices::in_memory()
        .with_store(Arc::new(JsonFileModuleStore::open(&store_path).unwrap()));
    let mut manager = ModuleManager::new(services);
    register(&mut manager, ModuleDescriptor::new("Core", "1.1.0"));
    register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0").enabled_by_default(true));

    assert!(manager.get("Core").unwrap().is_enabled());
    assert!(!manager.get("Blog").unwrap().is_enabled());
    assert_eq!(manager.services().store.find("Core").unwrap().unwrap().version, "1.1.0");
}

#[test]
fn test_managers_share_record_file() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("modules.json");
    let open = || {
        let store = JsonFileModuleStore::open(&store_path).unwrap();
        let mut manager = ModuleManager::new(ModuleServices::in_memory().with_store(Arc::new(store)));
        register(&mut manager, ModuleDescriptor::new("Core", "1.0.0"));
        register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0"));
        manager
    };

    // 常驻进程和命令行进程各持有一个管理器
    let mut panel = open();
    let mut cli = open();

    assert!(cli.enable("Blog").unwrap());
    assert!(panel.get("Blog").unwrap().is_enabled());

    assert!(panel.enable("Core").unwrap());
    let reopened = JsonFileModuleStore::open(&store_path).unwrap();
    assert!(reopened.find("Blog").unwrap().unwrap().enabled);
    assert!(reopened.find("Core").unwrap().unwrap().enabled);
    assert!(cli.get("Core").unwrap().is_enabled());
}

#[test]
fn test_persistence_failure_is_absorbed() {
    let mut manager = ModuleManager::new(ModuleServices::in_memory().with_store(Arc::new(ReadOnlyStore)));

    // 注册时的记录镜像失败不影响注册
    register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0"));
    register(&mut manager, ModuleDescriptor::new("Shop", "1.0.0"));
    assert!(manager.has("Blog"));

    assert!(manager.enable("Blog").unwrap());
    assert!(manager.get("Blog").unwrap().is_enabled());

    let report = manager
        .transition("Shop", LifecycleAction::Enable)
        .unwrap()
        .unwrap();
    assert!(report.applied());
    assert!(report.has_failure(stages::PERSIST));
    assert!(manager.module_info("Shop").unwrap().enabled);
}

#[tokio::test]
async fn test_events_follow_transitions() {
    let sink = Arc::new(BroadcastEventSink::new(16));
    let mut rx = sink.subscribe();
    let mut manager = ModuleManager::new(ModuleServices::in_memory().with_events(sink));
    register(&mut manager, ModuleDescriptor::new("Blog", "1.0.0"));

    manager.enable("Blog").unwrap();
    manager.enable("Blog").unwrap();
    manager.disable("Blog").unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.event_type, module_events::MODULE_ENABLED);
    assert_eq!(second.event_type, module_events::MODULE_DISABLED);
    assert_eq!(second.module, "Blog");
    assert!(rx.try_recv().is_err());
}
