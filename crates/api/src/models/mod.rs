pub mod descriptor;
pub mod location;
pub mod naming;
pub mod strategy;

pub use descriptor::{ModuleDescriptor, ModuleDescriptorBuilder, ServiceBinding};
pub use location::Location;
pub use strategy::LookupStrategy;
