use enclave_api::ModuleDiscoverer;
use enclave_core::{ContainerConfig, ContainerContext, InMemorySource};
use enclave_jdk::{JDK_MODULE, JdkEnvironmentDiscoverer, JdkHome};
use std::sync::Arc;

#[test]
fn test_locate_host_jdk() {
    // Depends on the environment: there may be no JDK at all.
    match JdkHome::locate() {
        Some(home) => {
            println!("Found JDK at {:?} ({:?})", home.root, home.version);
            assert!(!home.runtime.is_empty());
        }
        None => println!("No JDK on this host"),
    }
}

#[test]
fn test_platform_module_in_container() {
    let temp = tempfile::tempdir().unwrap();
    let classes = temp.path().join("platform");
    let object = classes.join("java/lang/Object.class");
    std::fs::create_dir_all(object.parent().unwrap()).unwrap();
    std::fs::write(&object, "").unwrap();
    let internal = classes.join("sun/misc/Unsafe.class");
    std::fs::create_dir_all(internal.parent().unwrap()).unwrap();
    std::fs::write(&internal, "").unwrap();

    let discoverer = JdkEnvironmentDiscoverer::with_path_lists([classes.as_os_str()]);
    assert_eq!(discoverer.name(), "JDK Environment Discoverer");

    let config = ContainerConfig {
        boot_namespaces: Vec::new(),
        ..ContainerConfig::default()
    };
    let context = ContainerContext::builder(config)
        .platform_discoverer(discoverer)
        .build()
        .unwrap();

    let modules = context.modules().unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name(), JDK_MODULE);

    let factory = context.scope_factory().unwrap();
    let base =
        InMemorySource::new("platform").with_symbols(["java.lang.Object", "sun.misc.Unsafe"]);
    let container = factory.create_container_scope(Arc::new(base));
    assert!(container.resolve("java.lang.Object").is_some());
    assert!(container.resolve("sun.misc.Unsafe").is_some());
    assert!(container.resolve("org.unknown.Thing").is_none());
}
