//! Errors are shared with the API crate so discoverers implemented outside
//! this crate report through the same type.

pub use enclave_api::error::{ContainerError, Result};
