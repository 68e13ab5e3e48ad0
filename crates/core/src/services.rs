//! On-disk service markers.
//!
//! Writes every module's service bindings as
//! `<dir>/<module>/META-INF/services/<interface>` files, one implementation
//! per line, so resource-based service loaders can find them.

use crate::discovery::SearchPath;
use crate::scope::{Releasable, SearchPathSource};
use enclave_api::{ContainerError, ModuleDescriptor, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub const SERVICES_FOLDER: &str = "META-INF/services";

#[derive(Debug)]
pub struct ServiceMarkers {
    dir: PathBuf,
    modules: Vec<PathBuf>,
    released: AtomicBool,
}

impl ServiceMarkers {
    /// `<tmp>/enclave-services-<pid>`
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join(format!("enclave-services-{}", std::process::id()))
    }

    /// Recreates `dir` and writes the markers of every module with bindings.
    ///
    /// Bindings whose names are not dotted identifiers are rejected before
    /// anything is written.
    pub fn materialize(dir: impl Into<PathBuf>, modules: &[ModuleDescriptor]) -> Result<Self> {
        let dir = dir.into();
        for module in modules {
            if let Some(binding) = module.services().iter().find(|b| !b.is_valid()) {
                return Err(ContainerError::invalid_descriptor(
                    module.name(),
                    format!(
                        "service binding {}:{} is not a pair of dotted names",
                        binding.interface, binding.implementation
                    ),
                ));
            }
        }

        if dir.exists() {
            debug!("Removing stale service markers in {:?}", dir);
            std::fs::remove_dir_all(&dir).map_err(|e| ContainerError::discovery(&dir, e))?;
        }
        std::fs::create_dir_all(&dir).map_err(|e| ContainerError::discovery(&dir, e))?;

        let mut used = HashSet::new();
        let mut written = Vec::new();
        let mut files = 0;
        for module in modules.iter().filter(|m| !m.services().is_empty()) {
            let mut by_interface: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for binding in module.services() {
                by_interface
                    .entry(binding.interface.as_str())
                    .or_default()
                    .push(binding.implementation.as_str());
            }

            let entry = dir.join(unique_entry_name(module.name(), &mut used));
            let services = entry.join(SERVICES_FOLDER);
            std::fs::create_dir_all(&services)
                .map_err(|e| ContainerError::discovery(&services, e))?;
            for (interface, implementations) in by_interface {
                let file = services.join(interface);
                let mut content = implementations.join("\n");
                content.push('\n');
                std::fs::write(&file, content).map_err(|e| ContainerError::discovery(&file, e))?;
                files += 1;
            }
            written.push(entry);
        }

        info!(
            "Materialized {} service markers for {} modules in {:?}",
            files,
            written.len(),
            dir
        );
        Ok(Self {
            dir,
            modules: written,
            released: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One entry per module that has markers.
    pub fn search_path(&self) -> SearchPath {
        SearchPath::new(self.modules.iter().cloned())
    }

    pub fn source(&self, name: impl Into<String>) -> SearchPathSource {
        SearchPathSource::new(name, self.search_path())
    }

    /// Deletes the marker directory. Later calls do nothing.
    pub fn release(&self) -> std::io::Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                debug!("Removed service markers in {:?}", self.dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Module names may contain characters that are not valid in file names.
fn entry_name(module: &str) -> String {
    let name: String = module
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.chars().all(|c| c == '.') {
        name.replace('.', "_")
    } else {
        name
    }
}

/// [`entry_name`], suffixed with `-2`, `-3`, ... when an earlier module
/// already took it.
fn unique_entry_name(module: &str, used: &mut HashSet<String>) -> String {
    let base = entry_name(module);
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

impl Releasable for ServiceMarkers {
    fn name(&self) -> &str {
        "service markers"
    }

    fn release(&self) -> std::io::Result<()> {
        ServiceMarkers::release(self)
    }
}

impl Drop for ServiceMarkers {
    fn drop(&mut self) {
        if let Err(e) = ServiceMarkers::release(self) {
            warn!("Failed to clean up service markers in {:?}: {}", self.dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_api::{ServiceBinding, SymbolSource};

    fn modules() -> Vec<ModuleDescriptor> {
        vec![
            ModuleDescriptor::builder("org.acme:http")
                .services([
                    ServiceBinding::new("org.acme.Spi", "org.acme.http.SpiImpl"),
                    ServiceBinding::new("org.acme.Spi", "org.acme.http.OtherImpl"),
                ])
                .build()
                .unwrap(),
            ModuleDescriptor::builder("plain").build().unwrap(),
        ]
    }

    #[test]
    fn test_materialize_and_release() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("markers");
        std::fs::create_dir_all(dir.join("stale")).unwrap();

        let markers = ServiceMarkers::materialize(&dir, &modules()).unwrap();
        assert!(!dir.join("stale").exists());

        let file = dir.join("org.acme_http/META-INF/services/org.acme.Spi");
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "org.acme.http.SpiImpl\norg.acme.http.OtherImpl\n");
        assert!(!dir.join("plain").exists());

        let source = markers.source("markers");
        assert_eq!(source.find_resources("META-INF/services/org.acme.Spi").len(), 1);

        markers.release().unwrap();
        assert!(!dir.exists());
        markers.release().unwrap();
    }

    #[test]
    fn test_colliding_module_names_keep_separate_markers() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("markers");
        let modules = vec![
            ModuleDescriptor::builder("org.acme:http")
                .service(ServiceBinding::new("org.acme.Spi", "org.acme.A"))
                .build()
                .unwrap(),
            ModuleDescriptor::builder("org.acme_http")
                .service(ServiceBinding::new("org.acme.Spi", "org.acme.B"))
                .build()
                .unwrap(),
        ];

        let markers = ServiceMarkers::materialize(&dir, &modules).unwrap();
        let read = |entry: &str| {
            let file = dir.join(entry).join("META-INF/services/org.acme.Spi");
            std::fs::read_to_string(file).unwrap()
        };
        assert_eq!(read("org.acme_http"), "org.acme.A\n");
        assert_eq!(read("org.acme_http-2"), "org.acme.B\n");

        let hits = markers
            .source("markers")
            .find_resources("META-INF/services/org.acme.Spi");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_bindings_cannot_escape_the_marker_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested/markers");
        let escaped = temp.path().join("escaped.txt");
        let modules = vec![
            ModuleDescriptor::builder("m")
                .service(ServiceBinding::new("../../../escaped.txt", "org.acme.Impl"))
                .build()
                .unwrap(),
        ];

        let result = ServiceMarkers::materialize(&dir, &modules);
        assert!(matches!(result, Err(ContainerError::InvalidDescriptor { .. })));
        assert!(!escaped.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_dot_module_names_stay_inside() {
        assert_eq!(entry_name(".."), "__");
        assert_eq!(entry_name("org.acme:http"), "org.acme_http");
    }

    #[test]
    fn test_drop_releases() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("markers");
        {
            let _markers = ServiceMarkers::materialize(&dir, &modules()).unwrap();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
    }
}
