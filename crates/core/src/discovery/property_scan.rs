//! Discovery from `META-INF/enclave-module.properties` resources.

use super::dedup_by_name;
use super::properties::{parse_properties, split_list};
use super::search_path::{SearchPath, entry_location, read_resource};
use enclave_api::{ContainerError, ModuleDescriptor, ModuleDiscoverer, Result, ServiceBinding};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Well-known descriptor resource looked up on every search path entry.
pub const MODULE_DESCRIPTOR_RESOURCE: &str = "META-INF/enclave-module.properties";

pub const MODULE_NAME: &str = "module.name";
pub const EXPORTED_NAMESPACES: &str = "module.export.classPackages";
pub const EXPORTED_RESOURCES: &str = "module.export.resources";
pub const PRIVILEGED_NAMESPACES: &str = "module.privileged.classPackages";
pub const PRIVILEGED_CONSUMERS: &str = "module.privileged.artifactIds";
pub const EXPORTED_SERVICES: &str = "module.export.services";

/// Scans every descriptor resource visible on a search path.
#[derive(Debug, Clone)]
pub struct PropertyScanDiscoverer {
    search_path: SearchPath,
}

impl PropertyScanDiscoverer {
    pub fn new(search_path: SearchPath) -> Self {
        Self { search_path }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Reads the descriptor of a single search path entry, if it has one.
    pub fn discover_at(&self, entry: &Path) -> Result<Option<ModuleDescriptor>> {
        match read_resource(entry, MODULE_DESCRIPTOR_RESOURCE)? {
            Some(bytes) => {
                let origin = entry_location(entry, MODULE_DESCRIPTOR_RESOURCE);
                parse_descriptor(&String::from_utf8_lossy(&bytes), &origin).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl ModuleDiscoverer for PropertyScanDiscoverer {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>> {
        let start = std::time::Instant::now();
        let hits = self.search_path.find_resources(MODULE_DESCRIPTOR_RESOURCE)?;

        let mut descriptors = Vec::with_capacity(hits.len());
        for hit in &hits {
            let origin = hit.origin();
            debug!("Reading module descriptor {}", origin);
            descriptors.push(parse_descriptor(
                &String::from_utf8_lossy(&hit.bytes),
                &origin,
            )?);
        }

        let descriptors = dedup_by_name(descriptors, self.name());
        info!(
            "Property scan complete: {} entries, {} modules in {:?}",
            self.search_path.entries().len(),
            descriptors.len(),
            start.elapsed()
        );
        Ok(descriptors)
    }

    fn name(&self) -> &str {
        "Property Scan Discoverer"
    }
}

/// Parses the text of a descriptor resource.
pub fn parse_descriptor(text: &str, origin: &str) -> Result<ModuleDescriptor> {
    descriptor_from_properties(&parse_properties(text), origin)
}

/// Builds a descriptor from already parsed properties.
pub fn descriptor_from_properties(
    properties: &HashMap<String, String>,
    origin: &str,
) -> Result<ModuleDescriptor> {
    let name = properties
        .get(MODULE_NAME)
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ContainerError::invalid_descriptor(origin, format!("missing '{}'", MODULE_NAME))
        })?;

    let list = |key: &str| {
        properties
            .get(key)
            .map(|value| split_list(value))
            .unwrap_or_default()
    };

    let mut services = Vec::new();
    for pair in list(EXPORTED_SERVICES) {
        let binding = ServiceBinding::parse(&pair).ok_or_else(|| {
            ContainerError::invalid_descriptor(
                origin,
                format!(
                    "service '{}' in '{}' is not an interface:implementation pair",
                    pair, EXPORTED_SERVICES
                ),
            )
        })?;
        services.push(binding);
    }

    ModuleDescriptor::builder(name)
        .export_namespaces(list(EXPORTED_NAMESPACES))
        .export_resources(list(EXPORTED_RESOURCES))
        .privileged_namespaces(list(PRIVILEGED_NAMESPACES))
        .privileged_consumers(list(PRIVILEGED_CONSUMERS))
        .services(services)
        .build()
}
