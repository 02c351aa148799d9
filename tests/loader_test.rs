//! 外部模块加载器集成测试

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chips_modules::{
    CoreError, ExternalModuleLoader, ManifestOnly, ModuleBehavior, ModuleDescriptor,
    ModuleFactories, ModuleManager, ModuleServices,
};
use tempfile::TempDir;

fn write_module(dir: &Path, name: &str, manifest: &str) {
    let root = dir.join(name);
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("module.json"), manifest).unwrap();
}

fn factories(built: Arc<AtomicUsize>) -> ModuleFactories {
    let mut factories = ModuleFactories::new();
    let counter = built.clone();
    factories.register("Modules::Blog::BlogModule", move |_: &ModuleDescriptor| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });
    factories.register("Modules::ShopModule", move |_: &ModuleDescriptor| {
        built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });
    factories.register("Modules::Broken", |_: &ModuleDescriptor| {
        Err(CoreError::Internal("构造失败".to_string()))
    });
    factories
}

#[tokio::test]
async fn test_load_from_path_registers_known_modules() {
    let temp = TempDir::new().unwrap();
    let modules = temp.path().join("modules");
    write_module(&modules, "Blog", r#"{"name": "Blog", "version": "1.0.0", "config": {"per_page": 5}}"#);
    write_module(&modules, "Shop", r#"{"name": "Shop", "dependencies": ["Blog"]}"#);
    write_module(&modules, "Broken", r#"{"name": "Broken"}"#);
    write_module(&modules, "Unknown", r#"{"name": "Unknown"}"#);
    write_module(&modules, "Invalid", r#"{"version": "1.0.0"}"#);
    // 没有清单的目录被跳过
    std::fs::create_dir_all(modules.join("NoManifest")).unwrap();

    let built = Arc::new(AtomicUsize::new(0));
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(factories(built.clone()));

    let registered = loader.load_from_path(&mut manager, &modules, "Modules").await;
    assert_eq!(registered, vec!["Blog".to_string(), "Shop".to_string()]);
    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert_eq!(manager.len(), 2);

    let blog = manager.module_info("Blog").unwrap();
    assert_eq!(blog.path.as_deref(), Some(modules.join("Blog").as_path()));
    assert_eq!(blog.config.get("per_page"), Some(&serde_json::json!(5)));
    assert!(loader.is_loaded(&modules));
}

#[tokio::test]
async fn test_load_from_path_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let modules = temp.path().join("modules");
    write_module(&modules, "Blog", r#"{"name": "Blog"}"#);

    let built = Arc::new(AtomicUsize::new(0));
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(factories(built.clone()));

    assert_eq!(loader.load_from_path(&mut manager, &modules, "Modules").await.len(), 1);
    assert!(loader.load_from_path(&mut manager, &modules, "Modules").await.is_empty());
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_directory_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(ModuleFactories::new());

    let missing = temp.path().join("missing");
    assert!(loader.load_from_path(&mut manager, &missing, "Modules").await.is_empty());
    assert!(!loader.is_loaded(&missing));
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_manifest_fallback_loads_every_module() {
    let temp = TempDir::new().unwrap();
    let modules = temp.path().join("modules");
    write_module(&modules, "Blog", r#"{"name": "Blog"}"#);
    let yaml_root = modules.join("Shop");
    std::fs::create_dir_all(&yaml_root).unwrap();
    std::fs::write(yaml_root.join("module.yaml"), "name: Shop\nenabled: true\n").unwrap();

    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(ModuleFactories::new().with_manifest_fallback());

    let registered = loader.load_from_path(&mut manager, &modules, "App").await;
    assert_eq!(registered.len(), 2);
    assert!(manager.get("Shop").unwrap().is_enabled());
}

#[tokio::test]
async fn test_load_from_vendor_uses_package_namespace() {
    let temp = TempDir::new().unwrap();
    let vendor = temp.path().join("vendor");

    let acme = vendor.join("acme").join("shop-pack");
    write_module(&acme.join("modules"), "Shop", r#"{"name": "Shop"}"#);
    std::fs::write(acme.join("package.json"), r#"{"name": "acme/shop-pack", "namespace": "Acme"}"#).unwrap();

    let plain = vendor.join("other").join("blog-pack");
    write_module(&plain.join("modules"), "Blog", r#"{"name": "Blog"}"#);

    // 没有 modules 目录的包被忽略
    std::fs::create_dir_all(vendor.join("other").join("utils")).unwrap();

    let mut factories = ModuleFactories::new();
    factories.register("Acme::Shop", |_: &ModuleDescriptor| {
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });
    factories.register("Modules::Blog::Module", |_: &ModuleDescriptor| {
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });

    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(factories);

    let mut registered = loader.load_from_vendor(&mut manager, &vendor).await;
    registered.sort();
    assert_eq!(registered, vec!["Blog".to_string(), "Shop".to_string()]);
}

#[tokio::test]
async fn test_register_custom_module() {
    let temp = TempDir::new().unwrap();
    write_module(temp.path(), "Custom", r#"{"name": "Custom"}"#);
    std::fs::create_dir_all(temp.path().join("Empty")).unwrap();

    let mut factories = ModuleFactories::new();
    factories.register("Vendor::Custom", |_: &ModuleDescriptor| {
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });
    factories.register("Vendor::Failing", |_: &ModuleDescriptor| {
        Err(CoreError::Internal("构造失败".to_string()))
    });

    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(factories);
    let custom = temp.path().join("Custom");

    assert!(!loader.register_custom_module(&mut manager, &temp.path().join("Nope"), "Vendor::Custom").await);
    assert!(!loader.register_custom_module(&mut manager, &custom, "Vendor::Missing").await);
    assert!(!loader.register_custom_module(&mut manager, &custom, "Vendor::Failing").await);
    assert!(!loader.register_custom_module(&mut manager, &temp.path().join("Empty"), "Vendor::Custom").await);
    assert!(manager.is_empty());

    assert!(loader.register_custom_module(&mut manager, &custom, "Vendor::Custom").await);
    assert!(manager.has("Custom"));
}

#[tokio::test]
async fn test_vendor_uses_configured_default_namespace() {
    let temp = TempDir::new().unwrap();
    let vendor = temp.path().join("vendor");
    write_module(&vendor.join("acme").join("blog-pack").join("modules"), "Blog", r#"{"name": "Blog"}"#);

    let mut factories = ModuleFactories::new();
    factories.register("Plugins::Blog", |_: &ModuleDescriptor| {
        Ok(Box::new(ManifestOnly) as Box<dyn ModuleBehavior>)
    });

    let mut manager = ModuleManager::new(ModuleServices::in_memory());
    let mut loader = ExternalModuleLoader::new(factories).with_default_namespace("Plugins");
    assert_eq!(loader.default_namespace(), "Plugins");

    let registered = loader.load_from_vendor(&mut manager, &vendor).await;
    assert_eq!(registered, vec!["Blog".to_string()]);
}
