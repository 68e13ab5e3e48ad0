//! Container configuration.
//!
//! Precedence: environment overrides > JSON file > defaults.

use enclave_api::{ContainerError, LookupStrategy, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DEEP_MODULES: &str = "ENCLAVE_DEEP_MODULES";
pub const ENV_SEARCH_PATH: &str = "ENCLAVE_SEARCH_PATH";
pub const ENV_MARKER_DIR: &str = "ENCLAVE_MARKER_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Use host module metadata when the host provides it.
    pub deep_modules: bool,
    pub search_path: Vec<PathBuf>,
    /// Module-name prefixes deep discovery includes. Empty includes all.
    pub module_prefixes: Vec<String>,
    pub boot_namespaces: Vec<String>,
    pub reserved_roots: Vec<String>,
    pub overrides: ExportOverrides,
    pub materialize_service_markers: bool,
    pub marker_dir: Option<PathBuf>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            deep_modules: true,
            search_path: Vec::new(),
            module_prefixes: Vec::new(),
            boot_namespaces: [
                "java",
                "javax",
                "jdk",
                "org.w3c.dom",
                "org.xml.sax",
                "org.ietf.jgss",
                "org.omg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            reserved_roots: Vec::new(),
            overrides: ExportOverrides::default(),
            materialize_service_markers: false,
            marker_dir: None,
        }
    }
}

impl ContainerConfig {
    /// Loads a JSON file and applies process environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ContainerError::configuration(format!("invalid container config: {}", e)))
    }

    /// Applies overrides from an environment resolver.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(ENV_DEEP_MODULES) {
            match parse_switch(&v) {
                Some(enabled) => self.deep_modules = enabled,
                None => tracing::warn!(
                    var = ENV_DEEP_MODULES,
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env(ENV_SEARCH_PATH) {
            self.search_path = std::env::split_paths(&v)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(v) = env(ENV_MARKER_DIR) {
            self.marker_dir = Some(PathBuf::from(v));
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fixed strategies for container-exported namespaces.
///
/// Precedence: `legacy_parent_only`, then `child_first`, then
/// `parent_first`, then `exported_strategy`. Entries are plain string
/// prefixes (`javax.` matches `javax.xml` but not `javaxyz`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOverrides {
    pub exported_strategy: LookupStrategy,
    pub parent_first: Vec<String>,
    pub child_first: Vec<String>,
    pub legacy_parent_only: Vec<String>,
}

impl Default for ExportOverrides {
    fn default() -> Self {
        Self {
            exported_strategy: LookupStrategy::ParentOnly,
            parent_first: ["javax.", "org.w3c.dom", "org.xml.sax", "org.omg.", "org.ietf.jgss"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            child_first: Vec::new(),
            legacy_parent_only: Vec::new(),
        }
    }
}

impl ExportOverrides {
    pub fn strategy_for_export(&self, namespace: &str) -> LookupStrategy {
        let pinned =
            |prefixes: &[String]| prefixes.iter().any(|p| namespace.starts_with(p.as_str()));
        if pinned(&self.legacy_parent_only) {
            LookupStrategy::ParentOnly
        } else if pinned(&self.child_first) {
            LookupStrategy::ChildFirst
        } else if pinned(&self.parent_first) {
            LookupStrategy::ParentFirst
        } else {
            self.exported_strategy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert!(config.deep_modules);
        assert!(!config.materialize_service_markers);
        assert!(config.boot_namespaces.contains(&"java".to_string()));
        assert!(config.reserved_roots.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ContainerConfig::from_json(
            r#"{
                "deep_modules": false,
                "reserved_roots": ["enclave.kernel"],
                "overrides": { "child_first": ["org.compat."] }
            }"#,
        )
        .unwrap();

        assert!(!config.deep_modules);
        assert_eq!(config.reserved_roots, vec!["enclave.kernel"]);
        assert_eq!(config.overrides.exported_strategy, LookupStrategy::ParentOnly);
        assert_eq!(config.overrides.child_first, vec!["org.compat."]);
        assert!(!config.overrides.parent_first.is_empty());
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let result = ContainerConfig::from_json("{ \"deep_modules\": \"maybe\" }");
        assert!(matches!(result, Err(ContainerError::Configuration(_))));
    }

    #[test]
    fn test_env_overrides() {
        let search_path = std::env::join_paths(["/opt/a.jar", "/opt/classes"])
            .unwrap()
            .into_string()
            .unwrap();
        let env: HashMap<&str, String> = HashMap::from([
            (ENV_DEEP_MODULES, "false".to_string()),
            (ENV_SEARCH_PATH, search_path),
            (ENV_MARKER_DIR, "/tmp/markers".to_string()),
        ]);

        let mut config = ContainerConfig::default();
        config.apply_overrides(|key| env.get(key).cloned());

        assert!(!config.deep_modules);
        assert_eq!(
            config.search_path,
            vec![PathBuf::from("/opt/a.jar"), PathBuf::from("/opt/classes")]
        );
        assert_eq!(config.marker_dir, Some(PathBuf::from("/tmp/markers")));
    }

    #[test]
    fn test_invalid_switch_is_ignored() {
        let mut config = ContainerConfig::default();
        config.apply_overrides(|key| (key == ENV_DEEP_MODULES).then(|| "sometimes".to_string()));
        assert!(config.deep_modules);
    }

    #[test]
    fn test_export_override_precedence() {
        let overrides = ExportOverrides {
            child_first: vec!["javax.compat".to_string()],
            legacy_parent_only: vec!["javax.legacy".to_string()],
            ..ExportOverrides::default()
        };

        assert_eq!(overrides.strategy_for_export("org.acme"), LookupStrategy::ParentOnly);
        assert_eq!(overrides.strategy_for_export("javax.xml"), LookupStrategy::ParentFirst);
        assert_eq!(
            overrides.strategy_for_export("org.w3c.dom.events"),
            LookupStrategy::ParentFirst
        );
        assert_eq!(overrides.strategy_for_export("javax.compat.api"), LookupStrategy::ChildFirst);
        assert_eq!(overrides.strategy_for_export("javax.legacy"), LookupStrategy::ParentOnly);
    }
}
