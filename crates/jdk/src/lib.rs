//! Host platform discovery: locating a JDK and describing its standard
//! surface as a module.

pub mod discoverer;
pub mod home;
pub mod index;

pub use discoverer::{JDK_MODULE, JdkEnvironmentDiscoverer};
pub use home::JdkHome;
pub use index::{EntryFormat, PlatformIndex};
