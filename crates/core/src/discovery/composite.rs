//! Runs several discoverers as one.

use super::dedup_by_name;
use enclave_api::{ContainerError, ModuleDescriptor, ModuleDiscoverer, Result};
use tracing::{debug, info};

/// Concatenates the results of a fixed, non-empty list of discoverers.
pub struct CompositeDiscoverer {
    discoverers: Vec<Box<dyn ModuleDiscoverer>>,
}

impl CompositeDiscoverer {
    pub fn new(discoverers: Vec<Box<dyn ModuleDiscoverer>>) -> Result<Self> {
        if discoverers.is_empty() {
            return Err(ContainerError::configuration(
                "composite discoverer requires at least one discoverer",
            ));
        }
        Ok(Self { discoverers })
    }
}

impl ModuleDiscoverer for CompositeDiscoverer {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>> {
        let start = std::time::Instant::now();
        let mut descriptors = Vec::new();

        for discoverer in &self.discoverers {
            let found = discoverer.discover()?;
            debug!("Discoverer {} found {} modules", discoverer.name(), found.len());
            descriptors.extend(found);
        }

        let descriptors = dedup_by_name(descriptors, self.name());
        info!(
            "Module discovery complete: {} modules from {} discoverers in {:?}",
            descriptors.len(),
            self.discoverers.len(),
            start.elapsed()
        );
        Ok(descriptors)
    }

    fn name(&self) -> &str {
        "Composite Discoverer"
    }
}
