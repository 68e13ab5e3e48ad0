//! Discovery, visibility and lookup-policy engine of the enclave container.

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod filter;
pub mod logging;
pub mod policy;
pub mod scope;
pub mod services;

pub use config::{ContainerConfig, ExportOverrides};
pub use context::{ContainerContext, ContainerContextBuilder};
pub use error::{ContainerError, Result};
pub use factory::{ScopeFactory, ScopeFactoryBuilder, UnitSpec};
pub use filter::VisibilityFilter;
pub use policy::LookupPolicy;
pub use scope::{InMemorySource, Releasable, Scope, ScopeBuilder, SearchPathSource};
pub use services::ServiceMarkers;
