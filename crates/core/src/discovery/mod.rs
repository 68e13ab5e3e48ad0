//! Module discovery.
//!
//! Discoverers turn raw sources into [`ModuleDescriptor`]s:
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ platform discoverer      │   │ DeepModuleDiscoverer     │
//! │ (JDK surface)            │   │  └─ PropertyScan fallback │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              └──────────────┬───────────────┘
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │ CompositeDiscoverer │  concat + dedup by name
//!                  └─────────────────────┘
//! ```
//!
//! Concrete platform discoverers live in their own crates
//! (`enclave-jdk::JdkEnvironmentDiscoverer`).

pub mod composite;
pub mod deep_module;
pub mod properties;
pub mod property_scan;
pub mod search_path;

pub use composite::CompositeDiscoverer;
pub use deep_module::{
    DeepModuleDiscoverer, HostModule, LayerId, ModuleDeclaration, ModuleExport,
    ModuleLayerGraph, ModuleRequirement, PrivilegedMarker,
};
pub use property_scan::{MODULE_DESCRIPTOR_RESOURCE, PropertyScanDiscoverer};
pub use search_path::{ResourceHit, SearchPath};

use enclave_api::ModuleDescriptor;
use std::collections::HashSet;
use tracing::warn;

/// Keeps the first descriptor of every name, dropping later ones with a warning.
pub fn dedup_by_name(descriptors: Vec<ModuleDescriptor>, source: &str) -> Vec<ModuleDescriptor> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if seen.insert(descriptor.name().to_string()) {
            result.push(descriptor);
        } else {
            warn!(
                "{}: ignoring duplicate module '{}', the first one discovered wins",
                source,
                descriptor.name()
            );
        }
    }
    result
}
