//! Local symbol sources owned by a scope.

use crate::models::Location;

/// The resolver for symbols and resources a scope owns itself.
///
/// Sources know nothing about visibility or delegation; scopes decide
/// whether and when to ask them.
pub trait SymbolSource: Send + Sync {
    /// Source name, reported as the provider of every location it returns.
    fn name(&self) -> &str;

    /// Finds a dotted symbol (`org.acme.util.StringHelper`).
    fn find_symbol(&self, name: &str) -> Option<Location>;

    /// Finds the first entry for a normalized resource path.
    fn find_resource(&self, path: &str) -> Option<Location>;

    /// Finds every entry for a normalized resource path.
    fn find_resources(&self, path: &str) -> Vec<Location> {
        self.find_resource(path).into_iter().collect()
    }

    /// Releases whatever the source holds open. Called once on scope
    /// teardown; failures are reported, never propagated.
    fn dispose(&self) -> std::io::Result<()> {
        Ok(())
    }
}
