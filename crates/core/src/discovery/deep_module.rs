//! Discovery from first-class host module metadata.
//!
//! The host describes its modules as a graph of layers. Each layer points to
//! its parents; several layers may share a parent, so the graph is walked
//! with a visited set instead of assuming a tree.

use super::dedup_by_name;
use super::property_scan::PropertyScanDiscoverer;
use enclave_api::{
    ContainerError, ModuleDescriptor, ModuleDiscoverer, Result, ServiceBinding,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type LayerId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExport {
    pub namespace: String,
    /// Modules the export is restricted to. Empty means public.
    pub targets: Vec<String>,
}

impl ModuleExport {
    pub fn public(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            targets: Vec::new(),
        }
    }

    pub fn qualified(
        namespace: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        !self.targets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequirement {
    pub module: String,
    pub transitive: bool,
}

impl ModuleRequirement {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            transitive: false,
        }
    }

    pub fn transitive(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            transitive: true,
        }
    }
}

/// Declares namespaces only an allow-list of consumers may see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegedMarker {
    pub namespaces: Vec<String>,
    pub consumers: Vec<String>,
}

/// Rich metadata the host keeps for a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleDeclaration {
    pub exports: Vec<ModuleExport>,
    pub requires: Vec<ModuleRequirement>,
    pub privileged: Option<PrivilegedMarker>,
    pub resources: Vec<String>,
    pub services: Vec<ServiceBinding>,
}

impl ModuleDeclaration {
    pub fn public_exports(&self) -> impl Iterator<Item = &str> {
        self.exports
            .iter()
            .filter(|e| !e.is_qualified())
            .map(|e| e.namespace.as_str())
    }

    fn transitive_requires(&self) -> impl Iterator<Item = &str> {
        self.requires
            .iter()
            .filter(|r| r.transitive)
            .map(|r| r.module.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HostModule {
    pub name: String,
    /// `None` for modules the host knows only by name and location.
    pub declaration: Option<ModuleDeclaration>,
    /// Search path entry holding the module's code.
    pub location: Option<PathBuf>,
}

impl HostModule {
    pub fn declared(name: impl Into<String>, declaration: ModuleDeclaration) -> Self {
        Self {
            name: name.into(),
            declaration: Some(declaration),
            location: None,
        }
    }

    pub fn automatic(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            declaration: None,
            location: Some(location.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleLayer {
    pub name: String,
    pub parents: Vec<LayerId>,
    pub modules: Vec<HostModule>,
}

/// Parent-pointer graph of module layers.
#[derive(Debug, Clone, Default)]
pub struct ModuleLayerGraph {
    layers: Vec<ModuleLayer>,
}

impl ModuleLayerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer whose parents are already part of the graph.
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        parents: &[LayerId],
        modules: Vec<HostModule>,
    ) -> Result<LayerId> {
        let name = name.into();
        if let Some(missing) = parents.iter().find(|p| **p >= self.layers.len()) {
            return Err(ContainerError::configuration(format!(
                "layer '{}' refers to unknown parent layer {}",
                name, missing
            )));
        }
        self.layers.push(ModuleLayer {
            name,
            parents: parents.to_vec(),
            modules,
        });
        Ok(self.layers.len() - 1)
    }

    pub fn layer(&self, id: LayerId) -> Option<&ModuleLayer> {
        self.layers.get(id)
    }

    /// `start` followed by all of its ancestors, each exactly once,
    /// nearest first.
    pub fn walk(&self, start: LayerId) -> Vec<LayerId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(layer) = self.layers.get(id) else {
                continue;
            };
            order.push(id);
            queue.extend(layer.parents.iter().copied());
        }
        order
    }
}

/// Builds descriptors from host module metadata, falling back to the
/// descriptor-resource scan where metadata is missing or disabled.
pub struct DeepModuleDiscoverer {
    host: Option<(Arc<ModuleLayerGraph>, LayerId)>,
    prefixes: Vec<String>,
    fallback: PropertyScanDiscoverer,
    enabled: bool,
}

impl DeepModuleDiscoverer {
    pub fn new(
        graph: Arc<ModuleLayerGraph>,
        start: LayerId,
        prefixes: Vec<String>,
        fallback: PropertyScanDiscoverer,
    ) -> Self {
        Self {
            host: Some((graph, start)),
            prefixes,
            fallback,
            enabled: true,
        }
    }

    /// A discoverer for hosts without module metadata.
    pub fn without_host(fallback: PropertyScanDiscoverer) -> Self {
        Self {
            host: None,
            prefixes: Vec::new(),
            fallback,
            enabled: false,
        }
    }

    pub fn with_deep_modules(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// An empty prefix list includes every module.
    fn is_included(&self, name: &str) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    fn describe<'a>(
        &self,
        module: &'a HostModule,
        index: &HashMap<&'a str, &'a HostModule>,
    ) -> Result<Option<ModuleDescriptor>> {
        let Some(declaration) = &module.declaration else {
            return match &module.location {
                Some(location) => {
                    debug!(
                        "Module {} has no declaration, scanning {:?}",
                        module.name, location
                    );
                    let found = self.fallback.discover_at(location)?;
                    if found.is_none() {
                        warn!(
                            "Module {} has neither a declaration nor a descriptor resource",
                            module.name
                        );
                    }
                    Ok(found)
                }
                None => {
                    warn!(
                        "Module {} has no declaration and no location, skipping",
                        module.name
                    );
                    Ok(None)
                }
            };
        };

        let privileged = declaration.privileged.clone().unwrap_or_default();
        let mut exported: BTreeSet<String> =
            declaration.public_exports().map(str::to_string).collect();
        exported.extend(reexported_namespaces(declaration, index));

        ModuleDescriptor::builder(&module.name)
            .export_namespaces(exported)
            .hide_namespaces(&privileged.namespaces)
            .export_resources(declaration.resources.iter().cloned())
            .privileged_namespaces(privileged.namespaces)
            .privileged_consumers(privileged.consumers)
            .services(declaration.services.iter().cloned())
            .build()
            .map(Some)
    }
}

/// Public exports of every module reachable through `requires transitive`.
fn reexported_namespaces<'a>(
    declaration: &'a ModuleDeclaration,
    index: &HashMap<&'a str, &'a HostModule>,
) -> BTreeSet<String> {
    let mut result = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut pending: Vec<&'a str> = declaration.transitive_requires().collect();

    while let Some(name) = pending.pop() {
        if !visited.insert(name) {
            continue;
        }
        let Some(&required) = index.get(name) else {
            debug!("Transitively required module {} is not visible", name);
            continue;
        };
        if let Some(required_declaration) = &required.declaration {
            result.extend(required_declaration.public_exports().map(str::to_string));
            pending.extend(required_declaration.transitive_requires());
        }
    }
    result
}

impl ModuleDiscoverer for DeepModuleDiscoverer {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>> {
        let Some((graph, start)) = self.host.as_ref().filter(|_| self.enabled) else {
            debug!("Deep module discovery disabled, scanning descriptor resources");
            return self.fallback.discover();
        };

        let start_time = std::time::Instant::now();
        let layers = graph.walk(*start);

        // Nearer layers shadow modules of the same name further up.
        let mut index: HashMap<&str, &HostModule> = HashMap::new();
        for module in layers
            .iter()
            .filter_map(|id| graph.layer(*id))
            .flat_map(|layer| layer.modules.iter())
        {
            index.entry(module.name.as_str()).or_insert(module);
        }

        let mut descriptors = Vec::new();
        for layer in layers.iter().filter_map(|id| graph.layer(*id)) {
            debug!("Inspecting module layer {}", layer.name);
            for module in layer.modules.iter().filter(|m| self.is_included(&m.name)) {
                if let Some(descriptor) = self.describe(module, &index)? {
                    descriptors.push(descriptor);
                }
            }
        }

        let descriptors = dedup_by_name(descriptors, self.name());
        info!(
            "Deep module discovery complete: {} layers, {} modules in {:?}",
            layers.len(),
            descriptors.len(),
            start_time.elapsed()
        );
        Ok(descriptors)
    }

    fn name(&self) -> &str {
        "Deep Module Discoverer"
    }
}
