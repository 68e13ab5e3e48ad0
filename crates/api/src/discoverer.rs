//! Module discovery SPI.

use crate::error::Result;
use crate::models::ModuleDescriptor;

/// Produces module descriptors from one source (descriptor resources,
/// host module metadata, the platform runtime, ...).
///
/// Implementations return a stable order and never yield two descriptors
/// with the same name. A failed pass is an error as a whole: partial
/// results are never returned.
pub trait ModuleDiscoverer: Send + Sync {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>>;

    /// Discoverer name (for logging/debugging)
    fn name(&self) -> &str;
}

impl<T: ModuleDiscoverer + ?Sized> ModuleDiscoverer for Box<T> {
    fn discover(&self) -> Result<Vec<ModuleDescriptor>> {
        (**self).discover()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
