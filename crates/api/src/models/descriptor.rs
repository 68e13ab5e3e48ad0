use super::naming::{consumer_matches, is_dotted_identifier};
use crate::error::{ContainerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An `interface:implementation` pair a module offers to service loaders.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceBinding {
    pub interface: String,
    pub implementation: String,
}

impl ServiceBinding {
    pub fn new(interface: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            implementation: implementation.into(),
        }
    }

    /// Parses `interface:implementation`. Both sides must be dotted
    /// identifiers.
    pub fn parse(pair: &str) -> Option<Self> {
        let (interface, implementation) = pair.split_once(':')?;
        let binding = Self::new(interface.trim(), implementation.trim());
        binding.is_valid().then_some(binding)
    }

    /// Whether both names are dotted identifiers, safe to use as marker
    /// file names and contents.
    pub fn is_valid(&self) -> bool {
        is_dotted_identifier(&self.interface) && is_dotted_identifier(&self.implementation)
    }
}

/// Immutable description of what one module exposes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    name: String,
    exported_namespaces: BTreeSet<String>,
    exported_resources: BTreeSet<String>,
    privileged_namespaces: BTreeSet<String>,
    privileged_consumers: BTreeSet<String>,
    services: Vec<ServiceBinding>,
}

impl ModuleDescriptor {
    pub fn builder(name: impl Into<String>) -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exported_namespaces(&self) -> &BTreeSet<String> {
        &self.exported_namespaces
    }

    pub fn exported_resources(&self) -> &BTreeSet<String> {
        &self.exported_resources
    }

    pub fn privileged_namespaces(&self) -> &BTreeSet<String> {
        &self.privileged_namespaces
    }

    pub fn privileged_consumers(&self) -> &BTreeSet<String> {
        &self.privileged_consumers
    }

    pub fn services(&self) -> &[ServiceBinding] {
        &self.services
    }

    /// Whether `consumer` is on this module's privileged allow-list.
    ///
    /// Entries match exactly or as the leading `group:artifact` part of a
    /// versioned identity such as `group:artifact:1.0.0`.
    pub fn allows_privileged(&self, consumer: &str) -> bool {
        self.privileged_consumers
            .iter()
            .any(|allowed| consumer_matches(allowed, consumer))
    }
}

#[derive(Debug, Clone)]
pub struct ModuleDescriptorBuilder {
    name: String,
    exported_namespaces: BTreeSet<String>,
    exported_resources: BTreeSet<String>,
    privileged_namespaces: BTreeSet<String>,
    privileged_consumers: BTreeSet<String>,
    services: Vec<ServiceBinding>,
}

impl ModuleDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exported_namespaces: BTreeSet::new(),
            exported_resources: BTreeSet::new(),
            privileged_namespaces: BTreeSet::new(),
            privileged_consumers: BTreeSet::new(),
            services: Vec::new(),
        }
    }

    pub fn export_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_namespaces
            .extend(namespaces.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        self
    }

    /// Resource paths are stored without their leading separator.
    pub fn export_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for resource in resources {
            let resource: String = resource.into();
            let trimmed = resource.trim_start_matches('/');
            if !trimmed.is_empty() {
                self.exported_resources.insert(trimmed.to_string());
            }
        }
        self
    }

    pub fn privileged_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.privileged_namespaces
            .extend(namespaces.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        self
    }

    pub fn privileged_consumers<I, S>(mut self, consumers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.privileged_consumers
            .extend(consumers.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        self
    }

    pub fn service(mut self, binding: ServiceBinding) -> Self {
        if !self.services.contains(&binding) {
            self.services.push(binding);
        }
        self
    }

    pub fn services(self, bindings: impl IntoIterator<Item = ServiceBinding>) -> Self {
        bindings.into_iter().fold(self, |builder, b| builder.service(b))
    }

    /// Removes namespaces from the public export set, e.g. the ones a module
    /// marks as privileged.
    pub fn hide_namespaces<'a>(mut self, namespaces: impl IntoIterator<Item = &'a String>) -> Self {
        for ns in namespaces {
            self.exported_namespaces.remove(ns);
        }
        self
    }

    pub fn build(self) -> Result<ModuleDescriptor> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ContainerError::configuration(
                "module descriptor requires a non-empty name",
            ));
        }
        Ok(ModuleDescriptor {
            name,
            exported_namespaces: self.exported_namespaces,
            exported_resources: self.exported_resources,
            privileged_namespaces: self.privileged_namespaces,
            privileged_consumers: self.privileged_consumers,
            services: self.services,
        })
    }
}
