use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// A policy or descriptor request contradicts itself.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Discovery failed for {}: {source}", origin.display())]
    Discovery {
        origin: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid module descriptor {origin}: {reason}")]
    InvalidDescriptor { origin: String, reason: String },
    #[error("Archive error in {}: {reason}", origin.display())]
    Archive { origin: PathBuf, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ContainerError::Configuration(message.into())
    }

    pub fn discovery(origin: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContainerError::Discovery {
            origin: origin.into(),
            source,
        }
    }

    pub fn invalid_descriptor(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::InvalidDescriptor {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn archive(origin: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ContainerError::Archive {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
