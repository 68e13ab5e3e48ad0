//! Indexes the namespaces, resources and service bindings of platform
//! search path entries: directories, zip archives (jar, jmod) and runtime
//! images.

use enclave_api::{ContainerError, ModuleDescriptor, Result, ServiceBinding};
use ristretto_jimage::Image;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

const SERVICES_PREFIX: &str = "META-INF/services/";
const JMOD_CLASSES: &str = "classes/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    Directory,
    Zip,
    Jmod,
    RuntimeImage,
}

impl EntryFormat {
    /// Detects the format from the magic bytes of a file.
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        if path.is_dir() {
            return Ok(Some(EntryFormat::Directory));
        }
        let mut file = File::open(path).map_err(|e| ContainerError::discovery(path, e))?;
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_err() {
            return Ok(None);
        }
        Ok(match magic {
            // PK\x03\x04, PK\x05\x06 (empty), PK\x07\x08 (spanned)
            [0x50, 0x4B, _, _] if is_jmod(path) => Some(EntryFormat::Jmod),
            [0x50, 0x4B, _, _] => Some(EntryFormat::Zip),
            // JM\x01\x00 header in front of the archive
            [0x4A, 0x4D, 0x01, 0x00] => Some(EntryFormat::Jmod),
            // CAFEDADA (big-endian) or DADAFECA (little-endian)
            [0xCA, 0xFE, 0xDA, 0xDA] | [0xDA, 0xDA, 0xFE, 0xCA] => {
                Some(EntryFormat::RuntimeImage)
            }
            _ => None,
        })
    }
}

fn is_jmod(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("jmod")
}

#[derive(Debug, Clone, Default)]
pub struct PlatformIndex {
    pub namespaces: BTreeSet<String>,
    pub resources: BTreeSet<String>,
    pub services: Vec<ServiceBinding>,
}

impl PlatformIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one entry. Missing entries and files of unknown format are
    /// skipped; unreadable ones are errors.
    pub fn index_entry(&mut self, entry: &Path) -> Result<()> {
        if !entry.exists() {
            debug!("Skipping missing platform entry {:?}", entry);
            return Ok(());
        }
        match EntryFormat::detect(entry)? {
            Some(EntryFormat::Directory) => self.index_directory(entry),
            Some(EntryFormat::Zip) => self.index_archive(entry, ""),
            Some(EntryFormat::Jmod) => self.index_archive(entry, JMOD_CLASSES),
            Some(EntryFormat::RuntimeImage) => self.index_runtime_image(entry),
            None => {
                debug!("Skipping platform entry of unknown format {:?}", entry);
                Ok(())
            }
        }
    }

    pub fn into_descriptor(self, name: &str) -> Result<ModuleDescriptor> {
        ModuleDescriptor::builder(name)
            .export_namespaces(self.namespaces)
            .export_resources(self.resources)
            .services(self.services)
            .build()
    }

    fn index_directory(&mut self, root: &Path) -> Result<()> {
        for item in WalkDir::new(root).sort_by_file_name() {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                ContainerError::discovery(path, std::io::Error::other(e))
            })?;
            if !item.file_type().is_file() {
                continue;
            }
            let Ok(relative) = item.path().strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let path = item.path();
            self.add(&name, || std::fs::read_to_string(path))
                .map_err(|e| ContainerError::discovery(path, e))?;
        }
        Ok(())
    }

    /// Indexes a zip archive, keeping only entries below `prefix`.
    fn index_archive(&mut self, path: &Path, prefix: &str) -> Result<()> {
        let file = File::open(path).map_err(|e| ContainerError::discovery(path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| ContainerError::archive(path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| ContainerError::archive(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let full_name = entry.name().to_string();
            let Some(name) = full_name.strip_prefix(prefix) else {
                continue;
            };
            self.add(name, || {
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                Ok(content)
            })
            .map_err(|e| ContainerError::discovery(path, e))?;
        }
        Ok(())
    }

    /// Runtime images only contribute namespaces; resource parents look like
    /// `/java.base/java/lang` and lose their module segment.
    fn index_runtime_image(&mut self, path: &Path) -> Result<()> {
        let image = Image::from_file(path).map_err(|e| ContainerError::archive(path, e))?;
        for resource in image.iter() {
            let resource = resource.map_err(|e| ContainerError::archive(path, e))?;
            if resource.extension() != "class" || resource.base().contains('$') {
                continue;
            }
            if let Some(namespace) = runtime_image_namespace(&resource.parent().to_string()) {
                self.namespaces.insert(namespace);
            }
        }
        Ok(())
    }

    /// Classifies one entry name. `read` is only called for service files.
    fn add(
        &mut self,
        name: &str,
        read: impl FnOnce() -> std::io::Result<String>,
    ) -> std::io::Result<()> {
        if let Some(class_path) = name.strip_suffix(".class") {
            if !class_path.contains('$') {
                if let Some((folder, _)) = class_path.rsplit_once('/') {
                    if !folder.starts_with("META-INF") {
                        self.namespaces.insert(folder.replace('/', "."));
                    }
                }
            }
            return Ok(());
        }

        if let Some(interface) = name.strip_prefix(SERVICES_PREFIX) {
            if !interface.is_empty() && !interface.contains('/') {
                for implementation in parse_service_file(&read()?) {
                    let binding = ServiceBinding::new(interface, implementation);
                    if !binding.is_valid() {
                        debug!(
                            "Skipping malformed service binding {}:{}",
                            interface, implementation
                        );
                        continue;
                    }
                    if !self.services.contains(&binding) {
                        self.services.push(binding);
                    }
                }
            }
        }
        self.resources.insert(name.to_string());
        Ok(())
    }
}

/// Namespace of a runtime image resource parent: `/java.base/java/lang` is
/// `java.lang`. Module roots (`/java.base`, home of `module-info.class`) have
/// none.
fn runtime_image_namespace(parent: &str) -> Option<String> {
    let package = match parent.strip_prefix('/') {
        Some(rest) => rest.split_once('/')?.1,
        None => parent,
    };
    let package = package.trim_end_matches('/');
    if package.is_empty() || package.starts_with("META-INF") {
        return None;
    }
    Some(package.replace('/', "."))
}

/// Implementation names of a `META-INF/services` file, comments dropped.
pub fn parse_service_file(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .collect()
}
