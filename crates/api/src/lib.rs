pub mod discoverer;
pub mod error;
pub mod models;
pub mod source;

// Re-export commonly used types
pub use discoverer::ModuleDiscoverer;
pub use error::{ContainerError, Result};
pub use models::*;
pub use source::SymbolSource;
