//! Builds the container scope and unit scopes from discovered modules.

use crate::config::ExportOverrides;
use crate::filter::VisibilityFilter;
use crate::policy::LookupPolicy;
use crate::scope::{Releasable, Scope};
use enclave_api::{LookupStrategy, ModuleDescriptor, Result, SymbolSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CONTAINER_SCOPE: &str = "container";

/// What a deployable unit brings to its scope.
pub struct UnitSpec {
    pub name: String,
    /// Identity checked against privileged allow-lists. Defaults to `name`.
    pub consumer: Option<String>,
    pub local: Arc<dyn SymbolSource>,
    pub exported_namespaces: Vec<String>,
    pub exported_resources: Vec<String>,
    pub strategies: Vec<(String, LookupStrategy)>,
    pub releasables: Vec<Arc<dyn Releasable>>,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>, local: Arc<dyn SymbolSource>) -> Self {
        Self {
            name: name.into(),
            consumer: None,
            local,
            exported_namespaces: Vec::new(),
            exported_resources: Vec::new(),
            strategies: Vec::new(),
            releasables: Vec::new(),
        }
    }

    pub fn consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }

    pub fn export_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_namespaces
            .extend(namespaces.into_iter().map(Into::into));
        self
    }

    pub fn export_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_resources
            .extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn strategy(mut self, namespace: impl Into<String>, strategy: LookupStrategy) -> Self {
        self.strategies.push((namespace.into(), strategy));
        self
    }

    pub fn release_on_dispose(mut self, releasable: Arc<dyn Releasable>) -> Self {
        self.releasables.push(releasable);
        self
    }

    fn identity(&self) -> &str {
        self.consumer.as_deref().unwrap_or(&self.name)
    }
}

pub struct ScopeFactory {
    modules: Arc<Vec<ModuleDescriptor>>,
    boot_namespaces: Vec<String>,
    /// Reserved roots only; used by the container scope itself.
    base_policy: Arc<LookupPolicy>,
    /// Reserved roots plus the exported-namespace table; used by units.
    policy: Arc<LookupPolicy>,
    filter: Arc<VisibilityFilter>,
    releasables: Vec<Arc<dyn Releasable>>,
}

impl ScopeFactory {
    pub fn builder(modules: Arc<Vec<ModuleDescriptor>>) -> ScopeFactoryBuilder {
        ScopeFactoryBuilder {
            modules,
            boot_namespaces: Vec::new(),
            reserved_roots: Vec::new(),
            overrides: ExportOverrides::default(),
            releasables: Vec::new(),
        }
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// The policy unit scopes start from.
    pub fn lookup_policy(&self) -> &Arc<LookupPolicy> {
        &self.policy
    }

    pub fn filter(&self) -> &Arc<VisibilityFilter> {
        &self.filter
    }

    /// Root scope over the platform base source.
    pub fn create_container_scope(&self, base: Arc<dyn SymbolSource>) -> Scope {
        self.releasables
            .iter()
            .fold(
                Scope::builder(CONTAINER_SCOPE, base)
                    .filter(Arc::clone(&self.filter))
                    .policy(Arc::clone(&self.base_policy)),
                |builder, r| builder.release_on_dispose(Arc::clone(r)),
            )
            .build()
    }

    /// The container scope before filtering, for harnesses that need the
    /// whole universe.
    pub fn create_unfiltered_scope(&self, base: Arc<dyn SymbolSource>) -> Scope {
        Scope::builder(CONTAINER_SCOPE, base)
            .filter(Arc::new(VisibilityFilter::unrestricted()))
            .policy(Arc::clone(&self.base_policy))
            .build()
    }

    /// A deployable unit's scope delegating to `parent`.
    pub fn create_unit_scope(&self, unit: UnitSpec, parent: Arc<Scope>) -> Result<Scope> {
        let identity = unit.identity().to_string();

        let privileged: BTreeSet<&str> = self
            .filter
            .privileged_namespaces()
            .filter(|ns| self.filter.grants_privileged(ns, &identity))
            .collect();
        if !privileged.is_empty() {
            debug!(
                "Unit {} is granted privileged namespaces {:?}",
                unit.name, privileged
            );
        }

        let policy = self
            .policy
            .extend_prefixes(privileged, LookupStrategy::ParentOnly, true)?
            .extend(unit.strategies.iter().map(|(ns, s)| (ns, *s)), true)?;

        let exports: Vec<&String> = unit
            .exported_namespaces
            .iter()
            .filter(|ns| {
                let kept = policy.strategy_for(ns).is_child_first();
                if !kept {
                    warn!(
                        "Unit {} exports namespace {} which is provided by the container, \
                         ignoring it",
                        unit.name, ns
                    );
                }
                kept
            })
            .collect();
        let filter =
            VisibilityFilter::new(exports, &unit.exported_resources, &self.boot_namespaces);

        let mut builder = Scope::builder(&unit.name, Arc::clone(&unit.local))
            .delegate(parent)
            .filter(Arc::new(filter))
            .policy(Arc::new(policy))
            .consumer(identity);
        for releasable in unit.releasables {
            builder = builder.release_on_dispose(releasable);
        }
        Ok(builder.build())
    }
}

pub struct ScopeFactoryBuilder {
    modules: Arc<Vec<ModuleDescriptor>>,
    boot_namespaces: Vec<String>,
    reserved_roots: Vec<String>,
    overrides: ExportOverrides,
    releasables: Vec<Arc<dyn Releasable>>,
}

impl ScopeFactoryBuilder {
    pub fn boot_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boot_namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn reserved_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn overrides(mut self, overrides: ExportOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Attaches `releasable` to every container scope the factory builds.
    pub fn release_on_dispose(mut self, releasable: Arc<dyn Releasable>) -> Self {
        self.releasables.push(releasable);
        self
    }

    pub fn build(self) -> Result<ScopeFactory> {
        let base_policy = LookupPolicy::new(&self.reserved_roots);

        let mut table = Vec::new();
        for namespace in self.modules.iter().flat_map(|m| m.exported_namespaces()) {
            if base_policy.is_reserved(namespace) {
                debug!("Exported namespace {} is reserved, leaving it sealed", namespace);
                continue;
            }
            table.push((namespace, self.overrides.strategy_for_export(namespace)));
        }
        let policy = base_policy.extend(table, false)?;

        let filter = VisibilityFilter::from_descriptors(&self.modules, &self.boot_namespaces);
        info!(
            "Scope factory ready: {} modules, {} configured namespaces, {} boot namespaces",
            self.modules.len(),
            policy.configured_strategies().len(),
            self.boot_namespaces.len()
        );

        Ok(ScopeFactory {
            modules: self.modules,
            boot_namespaces: self.boot_namespaces,
            base_policy: Arc::new(base_policy),
            policy: Arc::new(policy),
            filter: Arc::new(filter),
            releasables: self.releasables,
        })
    }
}
