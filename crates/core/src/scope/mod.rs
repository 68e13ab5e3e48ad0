//! Nested resolution scopes.
//!
//! A scope answers two questions for a name: is it visible across this
//! boundary (the [`VisibilityFilter`]), and if so, who supplies it (the
//! [`LookupPolicy`] strategy ordering the local source and the delegate).
//!
//! ```text
//!   unit scope ──delegate──▶ container scope ──▶ (none)
//!     │ local: unit code        │ local: platform base source
//!     │ filter: unit exports    │ filter: all module exports + boot
//! ```
//!
//! Consumers of a scope call [`Scope::resolve`]; the code a scope owns sees
//! itself through [`Scope::lookup`], which skips the scope's own filter.

pub mod source;

pub use source::{InMemorySource, SearchPathSource};

use crate::filter::VisibilityFilter;
use crate::policy::LookupPolicy;
use enclave_api::models::naming::{
    folder_to_namespace, namespace_of, normalize_resource_path, resource_folder,
};
use enclave_api::{Location, SymbolSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Something a scope must release when it is disposed.
pub trait Releasable: Send + Sync {
    fn name(&self) -> &str;

    fn release(&self) -> std::io::Result<()>;
}

pub struct Scope {
    name: String,
    delegate: Option<Arc<Scope>>,
    filter: Arc<VisibilityFilter>,
    policy: Arc<LookupPolicy>,
    local: Arc<dyn SymbolSource>,
    consumer: Option<String>,
    owns_local: bool,
    releasables: Vec<Arc<dyn Releasable>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("local", &self.local.name())
            .field("consumer", &self.consumer)
            .field("delegate", &self.delegate.as_ref().map(|d| d.name()))
            .finish()
    }
}

impl Scope {
    pub fn builder(name: impl Into<String>, local: Arc<dyn SymbolSource>) -> ScopeBuilder {
        ScopeBuilder {
            name: name.into(),
            local,
            delegate: None,
            filter: Arc::new(VisibilityFilter::unrestricted()),
            policy: Arc::new(LookupPolicy::default()),
            consumer: None,
            releasables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delegate(&self) -> Option<&Arc<Scope>> {
        self.delegate.as_ref()
    }

    pub fn filter(&self) -> &Arc<VisibilityFilter> {
        &self.filter
    }

    pub fn policy(&self) -> &Arc<LookupPolicy> {
        &self.policy
    }

    pub fn local(&self) -> &Arc<dyn SymbolSource> {
        &self.local
    }

    /// Identity used as the caller context for privileged namespaces.
    pub fn consumer(&self) -> Option<&str> {
        self.consumer.as_deref()
    }

    /// Resolves a symbol on behalf of this scope's own consumer.
    pub fn resolve(&self, name: &str) -> Option<Location> {
        self.resolve_as(name, self.consumer.as_deref())
    }

    /// Resolves a symbol on behalf of `caller`.
    ///
    /// Hidden and absent symbols are both `None`.
    pub fn resolve_as(&self, name: &str, caller: Option<&str>) -> Option<Location> {
        let namespace = namespace_of(name);
        if !self.admits(namespace, caller) {
            return None;
        }
        self.dispatch_symbol(name, namespace, caller)
    }

    /// Resolves a symbol as the code owning this scope sees it.
    pub fn lookup(&self, name: &str) -> Option<Location> {
        self.dispatch_symbol(name, namespace_of(name), self.consumer.as_deref())
    }

    pub fn resolve_resource(&self, path: &str) -> Option<Location> {
        if !self.filter.exports_resource(path) {
            return None;
        }
        self.lookup_resource(path)
    }

    /// Every visible instance of a resource along the delegate chain.
    pub fn resolve_resources(&self, path: &str) -> Vec<Location> {
        if !self.filter.exports_resource(path) {
            return Vec::new();
        }
        self.lookup_resources(path)
    }

    pub fn lookup_resource(&self, path: &str) -> Option<Location> {
        let path = normalize_resource_path(path);
        self.resource_order(&path).iter().find_map(|&own| {
            if own {
                self.local.find_resource(&path)
            } else {
                self.delegate.as_ref()?.resolve_resource(&path)
            }
        })
    }

    pub fn lookup_resources(&self, path: &str) -> Vec<Location> {
        let path = normalize_resource_path(path);
        let mut found: Vec<Location> = Vec::new();
        for &own in self.resource_order(&path) {
            let hits = if own {
                self.local.find_resources(&path)
            } else {
                match &self.delegate {
                    Some(delegate) => delegate.resolve_resources(&path),
                    None => Vec::new(),
                }
            };
            for hit in hits {
                if !found.contains(&hit) {
                    found.push(hit);
                }
            }
        }
        found
    }

    pub fn exports_symbol(&self, name: &str) -> bool {
        self.filter.exports_symbol(name)
    }

    pub fn exports_namespace(&self, namespace: &str) -> bool {
        self.filter.exports_namespace(namespace)
    }

    pub fn exports_resource(&self, path: &str) -> bool {
        self.filter.exports_resource(path)
    }

    /// A scope with this scope's filter, policy and local source over a
    /// different delegate chain. The new scope does not own the local
    /// source; disposing it releases nothing.
    pub fn reroot(&self, delegate: Option<Arc<Scope>>) -> Scope {
        Scope {
            name: self.name.clone(),
            delegate,
            filter: Arc::clone(&self.filter),
            policy: Arc::clone(&self.policy),
            local: Arc::clone(&self.local),
            consumer: self.consumer.clone(),
            owns_local: false,
            releasables: Vec::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Releases the local source and attached resources. Every release is
    /// attempted; failures are logged. Later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Disposing scope {}", self.name);

        if self.owns_local {
            if let Err(e) = self.local.dispose() {
                warn!(
                    "Scope {}: failed to dispose source {}: {}",
                    self.name,
                    self.local.name(),
                    e
                );
            }
        }
        for releasable in &self.releasables {
            if let Err(e) = releasable.release() {
                warn!(
                    "Scope {}: failed to release {}: {}",
                    self.name,
                    releasable.name(),
                    e
                );
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn admits(&self, namespace: &str, caller: Option<&str>) -> bool {
        self.filter.exports_namespace(namespace)
            || caller.is_some_and(|c| self.filter.grants_privileged(namespace, c))
    }

    fn dispatch_symbol(
        &self,
        name: &str,
        namespace: &str,
        caller: Option<&str>,
    ) -> Option<Location> {
        self.policy
            .strategy_for(namespace)
            .order()
            .iter()
            .find_map(|&own| {
                if own {
                    self.local.find_symbol(name)
                } else {
                    self.delegate.as_ref()?.resolve_as(name, caller)
                }
            })
    }

    fn resource_order(&self, path: &str) -> &'static [bool] {
        self.policy
            .strategy_for(&folder_to_namespace(resource_folder(path)))
            .order()
    }
}

pub struct ScopeBuilder {
    name: String,
    local: Arc<dyn SymbolSource>,
    delegate: Option<Arc<Scope>>,
    filter: Arc<VisibilityFilter>,
    policy: Arc<LookupPolicy>,
    consumer: Option<String>,
    releasables: Vec<Arc<dyn Releasable>>,
}

impl ScopeBuilder {
    pub fn delegate(mut self, delegate: Arc<Scope>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn filter(mut self, filter: Arc<VisibilityFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn policy(mut self, policy: Arc<LookupPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }

    /// Releases `releasable` when the scope is disposed.
    pub fn release_on_dispose(mut self, releasable: Arc<dyn Releasable>) -> Self {
        self.releasables.push(releasable);
        self
    }

    pub fn build(self) -> Scope {
        Scope {
            name: self.name,
            delegate: self.delegate,
            filter: self.filter,
            policy: self.policy,
            local: self.local,
            consumer: self.consumer,
            owns_local: true,
            releasables: self.releasables,
            disposed: AtomicBool::new(false),
        }
    }
}
