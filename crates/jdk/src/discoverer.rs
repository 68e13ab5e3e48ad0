//! The host platform's standard surface as one module.

use crate::home::JdkHome;
use crate::index::PlatformIndex;
use enclave_api::{ModuleDescriptor, ModuleDiscoverer, Result};
use once_cell::sync::OnceCell;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const JDK_MODULE: &str = "jdk";

/// Produces a single descriptor named [`JDK_MODULE`], computed on first use.
pub struct JdkEnvironmentDiscoverer {
    /// Platform path lists (`a.jar:b.jar`). Empty means "locate a JDK".
    path_lists: Vec<OsString>,
    descriptor: OnceCell<ModuleDescriptor>,
}

impl JdkEnvironmentDiscoverer {
    /// Explores the runtime of the JDK found on this host.
    pub fn new() -> Self {
        Self {
            path_lists: Vec::new(),
            descriptor: OnceCell::new(),
        }
    }

    /// Explores the given platform path lists instead of locating a JDK.
    pub fn with_path_lists<I, S>(path_lists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            path_lists: path_lists.into_iter().map(Into::into).collect(),
            descriptor: OnceCell::new(),
        }
    }

    /// Entries to explore, or `None` when there is nothing to explore.
    pub fn entries(&self) -> Option<Vec<PathBuf>> {
        if !self.path_lists.is_empty() {
            return Some(
                self.path_lists
                    .iter()
                    .flat_map(std::env::split_paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect(),
            );
        }

        let home = JdkHome::locate()?;
        info!(
            "Using JDK at {:?} (version {})",
            home.root,
            home.version.as_deref().unwrap_or("unknown")
        );
        Some(home.runtime)
    }

    /// The platform descriptor. Indexing runs once; a failed run is retried
    /// on the next call.
    pub fn descriptor(&self) -> Result<&ModuleDescriptor> {
        self.descriptor.get_or_try_init(|| {
            let Some(entries) = self.entries() else {
                warn!("No JDK found, the platform module exports nothing");
                return ModuleDescriptor::builder(JDK_MODULE).build();
            };

            let start = std::time::Instant::now();
            let mut index = PlatformIndex::new();
            for entry in &entries {
                debug!("Indexing platform entry {:?}", entry);
                index.index_entry(entry)?;
            }
            info!(
                "Platform index complete: {} entries, {} namespaces, {} resources in {:?}",
                entries.len(),
                index.namespaces.len(),
                index.resources.len(),
                start.elapsed()
            );
            index.into_descriptor(JDK_MODULE)
        })
    }
}

impl Default for JdkEnvironmentDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDiscoverer for JdkEnvironmentDiscoverer {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>> {
        Ok(vec![self.descriptor()?.clone()])
    }

    fn name(&self) -> &str {
        "JDK Environment Discoverer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(root: &std::path::Path, name: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_explores_every_path_list() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("base");
        let xml = temp.path().join("xml");
        write_file(&base, "java/lang/Object.class");
        write_file(&xml, "javax/xml/XMLConstants.class");

        let first = std::env::join_paths([&base, &temp.path().join("missing")]).unwrap();
        let discoverer = JdkEnvironmentDiscoverer::with_path_lists([first, xml.into_os_string()]);

        let modules = discoverer.discover().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name(), JDK_MODULE);
        let namespaces: Vec<_> = modules[0].exported_namespaces().iter().cloned().collect();
        assert_eq!(namespaces, vec!["java.lang", "javax.xml"]);
    }

    #[test]
    fn test_descriptor_is_computed_once() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "java/lang/Object.class");
        let discoverer = JdkEnvironmentDiscoverer::with_path_lists([temp.path()]);

        let first = discoverer.descriptor().unwrap().clone();
        write_file(temp.path(), "java/util/List.class");
        let second = discoverer.descriptor().unwrap();
        assert_eq!(&first, second);
        assert!(!second.exported_namespaces().contains("java.util"));
    }

    #[test]
    fn test_unreadable_entry_fails() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("broken.jar");
        std::fs::write(&jar, b"PK\x03\x04 broken").unwrap();

        let discoverer = JdkEnvironmentDiscoverer::with_path_lists([jar]);
        assert!(discoverer.discover().is_err());
    }
}
