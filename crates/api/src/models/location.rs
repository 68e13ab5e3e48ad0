use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a symbol or resource request was satisfied.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Name of the symbol source that owns the entry.
    pub provider: String,
    /// Where the entry was read from (e.g. `lib/util.jar!/org/acme/util/StringHelper.class`).
    pub path: String,
}

impl Location {
    pub fn new(provider: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.path, self.provider)
    }
}
