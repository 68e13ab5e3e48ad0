//! Process-wide owner of discovery results.
//!
//! Discovery runs at most once per context and its result is shared by every
//! scope built afterwards. Callers own the context: create it at startup,
//! call [`ContainerContext::shutdown`] (or drop it) at teardown.

use crate::config::ContainerConfig;
use crate::discovery::{
    CompositeDiscoverer, DeepModuleDiscoverer, LayerId, ModuleLayerGraph, PropertyScanDiscoverer,
    SearchPath,
};
use crate::factory::ScopeFactory;
use crate::services::ServiceMarkers;
use enclave_api::{ModuleDescriptor, ModuleDiscoverer, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ContainerContext {
    config: ContainerConfig,
    discoverer: Box<dyn ModuleDiscoverer>,
    modules: OnceCell<Arc<Vec<ModuleDescriptor>>>,
    markers: OnceCell<Option<Arc<ServiceMarkers>>>,
}

impl ContainerContext {
    /// A context discovering modules from the configured search path only.
    pub fn new(config: ContainerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ContainerConfig) -> ContainerContextBuilder {
        ContainerContextBuilder {
            config,
            platform: Vec::new(),
            host: None,
        }
    }

    /// A context over an arbitrary discoverer stack.
    pub fn with_discoverer(config: ContainerConfig, discoverer: Box<dyn ModuleDiscoverer>) -> Self {
        Self {
            config,
            discoverer,
            modules: OnceCell::new(),
            markers: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Discovered modules. The first call runs discovery; a failed pass
    /// leaves nothing cached so a later call tries again.
    pub fn modules(&self) -> Result<Arc<Vec<ModuleDescriptor>>> {
        self.modules
            .get_or_try_init(|| {
                info!("Running module discovery with {}", self.discoverer.name());
                self.discoverer.discover().map(Arc::new)
            })
            .cloned()
    }

    /// Service markers for the discovered modules, when enabled.
    pub fn service_markers(&self) -> Result<Option<Arc<ServiceMarkers>>> {
        self.markers
            .get_or_try_init(|| {
                if !self.config.materialize_service_markers {
                    return Ok(None);
                }
                let dir = self
                    .config
                    .marker_dir
                    .clone()
                    .unwrap_or_else(ServiceMarkers::default_dir);
                let modules = self.modules()?;
                ServiceMarkers::materialize(dir, &modules).map(|m| Some(Arc::new(m)))
            })
            .cloned()
    }

    /// A factory over the discovered modules. Container scopes it builds
    /// release the service markers when disposed.
    pub fn scope_factory(&self) -> Result<ScopeFactory> {
        let mut builder = ScopeFactory::builder(self.modules()?)
            .boot_namespaces(self.config.boot_namespaces.iter().cloned())
            .reserved_roots(self.config.reserved_roots.iter().cloned())
            .overrides(self.config.overrides.clone());
        if let Some(markers) = self.service_markers()? {
            builder = builder.release_on_dispose(markers);
        }
        builder.build()
    }

    /// Releases everything the context created. Failures are logged.
    pub fn shutdown(&self) {
        if let Some(Some(markers)) = self.markers.get() {
            if let Err(e) = markers.release() {
                warn!("Failed to clean up service markers in {:?}: {}", markers.dir(), e);
            }
        }
    }
}

impl Drop for ContainerContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct ContainerContextBuilder {
    config: ContainerConfig,
    platform: Vec<Box<dyn ModuleDiscoverer>>,
    host: Option<(Arc<ModuleLayerGraph>, LayerId)>,
}

impl ContainerContextBuilder {
    /// Adds a discoverer consulted before the search path.
    pub fn platform_discoverer(mut self, discoverer: impl ModuleDiscoverer + 'static) -> Self {
        self.platform.push(Box::new(discoverer));
        self
    }

    /// Host module metadata for deep discovery, starting at `start`.
    pub fn host_modules(mut self, graph: Arc<ModuleLayerGraph>, start: LayerId) -> Self {
        self.host = Some((graph, start));
        self
    }

    pub fn build(self) -> Result<ContainerContext> {
        let property_scan =
            PropertyScanDiscoverer::new(SearchPath::new(self.config.search_path.iter().cloned()));
        let modules = match self.host {
            Some((graph, start)) => DeepModuleDiscoverer::new(
                graph,
                start,
                self.config.module_prefixes.clone(),
                property_scan,
            )
            .with_deep_modules(self.config.deep_modules),
            None => DeepModuleDiscoverer::without_host(property_scan),
        };

        let mut discoverers = self.platform;
        discoverers.push(Box::new(modules));
        let composite = CompositeDiscoverer::new(discoverers)?;

        Ok(ContainerContext::with_discoverer(
            self.config,
            Box::new(composite),
        ))
    }
}
