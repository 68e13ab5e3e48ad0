//! Per-namespace lookup strategies.
//!
//! A [`LookupPolicy`] is an immutable snapshot. Extending it returns a new
//! policy; the only interior mutability is the memo of computed answers.

use dashmap::DashMap;
use enclave_api::models::naming::{is_within, normalize_namespace};
use enclave_api::{ContainerError, LookupStrategy, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Strategy for namespaces nobody configured.
pub const DEFAULT_STRATEGY: LookupStrategy = LookupStrategy::ChildFirst;

#[derive(Debug, Default)]
pub struct LookupPolicy {
    configured: BTreeMap<String, LookupStrategy>,
    /// Namespace roots sealed to the scope's own source.
    reserved_roots: BTreeSet<String>,
    memo: DashMap<String, LookupStrategy>,
}

impl LookupPolicy {
    pub fn new<I, S>(reserved_roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            configured: BTreeMap::new(),
            reserved_roots: reserved_roots
                .into_iter()
                .map(|r| normalize_namespace(r.as_ref()).to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            memo: DashMap::new(),
        }
    }

    pub fn strategy_for(&self, namespace: &str) -> LookupStrategy {
        let namespace = normalize_namespace(namespace);
        if let Some(strategy) = self.memo.get(namespace) {
            return *strategy;
        }

        let strategy = match self.configured.get(namespace) {
            Some(strategy) => *strategy,
            None if self.is_reserved(namespace) => LookupStrategy::SelfOnly,
            None => DEFAULT_STRATEGY,
        };
        self.memo.insert(namespace.to_string(), strategy);
        strategy
    }

    /// Whether the namespace is a reserved root or lies below one.
    pub fn is_reserved(&self, namespace: &str) -> bool {
        let namespace = normalize_namespace(namespace);
        self.reserved_roots
            .iter()
            .any(|root| is_within(namespace, root))
    }

    /// A new policy with `mapping` applied on top of this one.
    ///
    /// Existing keys are kept unless `overwrite` is set. Mapping a reserved
    /// namespace to anything but [`LookupStrategy::SelfOnly`] is rejected.
    pub fn extend<I, K>(&self, mapping: I, overwrite: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (K, LookupStrategy)>,
        K: AsRef<str>,
    {
        let mapping: Vec<(String, LookupStrategy)> = mapping
            .into_iter()
            .map(|(k, s)| (normalize_namespace(k.as_ref()).to_string(), s))
            .collect();

        if let Some((namespace, strategy)) = mapping
            .iter()
            .find(|(ns, s)| *s != LookupStrategy::SelfOnly && self.is_reserved(ns))
        {
            return Err(ContainerError::configuration(format!(
                "cannot use {} for reserved namespace '{}'",
                strategy, namespace
            )));
        }

        let mut configured = self.configured.clone();
        for (namespace, strategy) in mapping {
            if overwrite {
                configured.insert(namespace, strategy);
            } else {
                configured.entry(namespace).or_insert(strategy);
            }
        }

        Ok(Self {
            configured,
            reserved_roots: self.reserved_roots.clone(),
            memo: DashMap::new(),
        })
    }

    /// [`Self::extend`] with the same strategy for every namespace.
    pub fn extend_prefixes<I, S>(
        &self,
        namespaces: I,
        strategy: LookupStrategy,
        overwrite: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(namespaces.into_iter().map(|ns| (ns, strategy)), overwrite)
    }

    pub fn configured_strategies(&self) -> &BTreeMap<String, LookupStrategy> {
        &self.configured
    }

    pub fn reserved_roots(&self) -> &BTreeSet<String> {
        &self.reserved_roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn policy() -> LookupPolicy {
        LookupPolicy::new(["java", "enclave.kernel."])
    }

    #[test]
    fn test_defaults() {
        let policy = policy();
        assert_eq!(policy.strategy_for("java"), LookupStrategy::SelfOnly);
        assert_eq!(policy.strategy_for("java.util."), LookupStrategy::SelfOnly);
        assert_eq!(policy.strategy_for("enclave.kernel.impl"), LookupStrategy::SelfOnly);
        assert_eq!(policy.strategy_for("javax.xml"), LookupStrategy::ChildFirst);
        assert_eq!(policy.strategy_for("org.acme"), LookupStrategy::ChildFirst);
    }

    #[test]
    fn test_reserved_root_cannot_be_weakened() {
        let policy = policy();
        for strategy in [
            LookupStrategy::ChildFirst,
            LookupStrategy::ParentFirst,
            LookupStrategy::ParentOnly,
        ] {
            let result = policy.extend([("java", strategy)], true);
            assert!(matches!(result, Err(ContainerError::Configuration(_))));
        }
        assert!(policy.extend([("java.lang", LookupStrategy::ParentOnly)], false).is_err());
        assert!(policy.extend([("java", LookupStrategy::SelfOnly)], false).is_ok());
    }

    #[test]
    fn test_extend_sets_unconfigured_keys() {
        let extended = policy()
            .extend([("org.acme", LookupStrategy::ParentOnly)], false)
            .unwrap();
        assert_eq!(extended.strategy_for("org.acme"), LookupStrategy::ParentOnly);
        assert_eq!(extended.strategy_for("org.acme."), LookupStrategy::ParentOnly);
    }

    #[test]
    fn test_overwrite_flag() {
        let base = policy()
            .extend([("org.acme", LookupStrategy::ParentOnly)], false)
            .unwrap();

        let kept = base
            .extend([("org.acme", LookupStrategy::ChildFirst)], false)
            .unwrap();
        assert_eq!(kept.strategy_for("org.acme"), LookupStrategy::ParentOnly);

        let replaced = base
            .extend([("org.acme", LookupStrategy::ChildFirst)], true)
            .unwrap();
        assert_eq!(replaced.strategy_for("org.acme"), LookupStrategy::ChildFirst);
    }

    #[test]
    fn test_extend_does_not_mutate_original() {
        let base = policy();
        assert_eq!(base.strategy_for("org.acme"), LookupStrategy::ChildFirst);

        let extended = base
            .extend_prefixes(["org.acme", "org.other"], LookupStrategy::ParentFirst, false)
            .unwrap();
        assert_eq!(extended.strategy_for("org.acme"), LookupStrategy::ParentFirst);
        assert_eq!(extended.strategy_for("org.other"), LookupStrategy::ParentFirst);
        assert_eq!(base.strategy_for("org.acme"), LookupStrategy::ChildFirst);
        assert!(base.configured_strategies().is_empty());
        assert_eq!(extended.reserved_roots(), base.reserved_roots());
    }

    #[test]
    fn test_concurrent_reads_agree() {
        let policy = Arc::new(
            policy()
                .extend([("org.acme", LookupStrategy::ParentOnly)], false)
                .unwrap(),
        );
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = Arc::clone(&policy);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| policy.strategy_for("org.acme"))
                        .all(|s| s == LookupStrategy::ParentOnly)
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
