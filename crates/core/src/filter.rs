//! Aggregated visibility predicate of a scope.

use enclave_api::ModuleDescriptor;
use enclave_api::models::naming::{
    ancestors, consumer_matches, folder_to_namespace, namespace_of, normalize_namespace,
    normalize_resource_path, resource_folder,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Decides which symbols and resources cross a scope boundary.
///
/// Immutable once built; every query is a pure lookup.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFilter {
    exported_namespaces: HashSet<String>,
    boot_namespaces: HashSet<String>,
    exported_resources: HashSet<String>,
    privileged: HashMap<String, BTreeSet<String>>,
    unrestricted: bool,
}

impl VisibilityFilter {
    pub fn new<N, R, B>(exported_namespaces: N, exported_resources: R, boot_namespaces: B) -> Self
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            exported_namespaces: exported_namespaces
                .into_iter()
                .map(|ns| normalize_namespace(ns.as_ref()).to_string())
                .collect(),
            boot_namespaces: boot_namespaces
                .into_iter()
                .map(|ns| normalize_namespace(ns.as_ref()).to_string())
                .filter(|ns| !ns.is_empty())
                .collect(),
            exported_resources: exported_resources
                .into_iter()
                .map(|r| normalize_resource(r.as_ref()))
                .filter(|r| !r.is_empty())
                .collect(),
            privileged: HashMap::new(),
            unrestricted: false,
        }
    }

    /// Union of every module's exports and privileged allow-lists.
    pub fn from_descriptors<B>(descriptors: &[ModuleDescriptor], boot_namespaces: B) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let mut filter = Self::new(
            descriptors.iter().flat_map(|d| d.exported_namespaces()),
            descriptors.iter().flat_map(|d| d.exported_resources()),
            boot_namespaces,
        );
        for descriptor in descriptors {
            for namespace in descriptor.privileged_namespaces() {
                filter = filter.with_privileged(namespace, descriptor.privileged_consumers());
            }
        }
        filter
    }

    /// A filter that lets everything through.
    pub fn unrestricted() -> Self {
        Self {
            unrestricted: true,
            ..Self::default()
        }
    }

    /// Adds `consumers` to the allow-list of a privileged namespace.
    pub fn with_privileged<I>(mut self, namespace: &str, consumers: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.privileged
            .entry(normalize_namespace(namespace).to_string())
            .or_default()
            .extend(consumers.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn exports_symbol(&self, name: &str) -> bool {
        self.exports_namespace(namespace_of(name))
    }

    pub fn exports_namespace(&self, namespace: &str) -> bool {
        if self.unrestricted {
            return true;
        }
        let namespace = normalize_namespace(namespace);
        self.exported_namespaces.contains(namespace) || self.is_boot(namespace)
    }

    pub fn exports_resource(&self, path: &str) -> bool {
        if self.unrestricted {
            return true;
        }
        let path = normalize_resource(path);
        if path.is_empty() {
            return false;
        }
        if self.exported_resources.contains(&path) {
            return true;
        }
        let folder = resource_folder(&path);
        !folder.is_empty()
            && (self.exported_resources.contains(folder)
                || self.is_boot(&folder_to_namespace(folder)))
    }

    /// Whether `namespace` is privileged and `consumer` is allowed to see it.
    pub fn grants_privileged(&self, namespace: &str, consumer: &str) -> bool {
        self.privileged
            .get(normalize_namespace(namespace))
            .is_some_and(|allowed| allowed.iter().any(|a| consumer_matches(a, consumer)))
    }

    pub fn privileged_namespaces(&self) -> impl Iterator<Item = &str> {
        self.privileged.keys().map(String::as_str)
    }

    /// The namespace or one of its ancestors is a boot namespace.
    fn is_boot(&self, namespace: &str) -> bool {
        ancestors(namespace).any(|ns| self.boot_namespaces.contains(ns))
    }
}

fn normalize_resource(path: &str) -> String {
    let mut normalized = normalize_resource_path(path);
    if normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}
