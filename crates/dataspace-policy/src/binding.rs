//! Rule binding registry.
//!
//! Maps a rule key (an action type or a constraint's left operand) to the
//! scopes in which it is active. Populated at bootstrap, read on every
//! evaluation.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::scope::Scope;

/// Key → scopes in which rules with that key are evaluated.
///
/// # Thread Safety
///
/// The registry is a plain owned value. It is `Send + Sync` and can be shared
/// read-only after bootstrap; runtime mutation needs an external lock.
#[derive(Debug, Clone, Default)]
pub struct RuleBindingRegistry {
    bindings: HashMap<String, BTreeSet<Scope>>,
}

impl RuleBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key` active in `scope` and every scope below it.
    ///
    /// Binding the same pair twice has no further effect.
    pub fn bind(&mut self, key: impl Into<String>, scope: impl Into<Scope>) {
        let key = key.into();
        let scope = scope.into();
        let scopes = self.bindings.entry(key.clone()).or_default();
        if scopes.insert(scope.clone()) {
            debug!(key = %key, scope = %scope, "Rule key bound");
        }
    }

    /// Builder form of [`bind`](Self::bind).
    pub fn with_binding(mut self, key: impl Into<String>, scope: impl Into<Scope>) -> Self {
        self.bind(key, scope);
        self
    }

    /// True if `key` is bound to [`ALL_SCOPES`](crate::scope::ALL_SCOPES),
    /// to `scope`, or to an ancestor of `scope`. Unknown keys are never in scope.
    pub fn is_in_scope(&self, key: &str, scope: &str) -> bool {
        self.bindings
            .get(key)
            .is_some_and(|scopes| scopes.iter().any(|bound| bound.contains(scope)))
    }

    /// True if `key` has at least one binding.
    pub fn is_bound(&self, key: &str) -> bool {
        self.bindings.get(key).is_some_and(|s| !s.is_empty())
    }

    /// The scopes `key` is bound to, in sorted order.
    pub fn scopes_for(&self, key: &str) -> Vec<&Scope> {
        self.bindings
            .get(key)
            .map(|scopes| scopes.iter().collect())
            .unwrap_or_default()
    }

    /// All bound keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ALL_SCOPES;

    #[test]
    fn test_unknown_key_is_not_in_scope() {
        let registry = RuleBindingRegistry::new();
        assert!(!registry.is_in_scope("region", "catalog"));
        assert!(!registry.is_bound("region"));
    }

    #[test]
    fn test_bound_scope_and_descendants() {
        let registry = RuleBindingRegistry::new().with_binding("region", "catalog");

        assert!(registry.is_in_scope("region", "catalog"));
        assert!(registry.is_in_scope("region", "catalog.contract-offer"));
        assert!(!registry.is_in_scope("region", "transfer"));
        assert!(!registry.is_in_scope("region", "catalogue"));
    }

    #[test]
    fn test_all_scopes_binding() {
        let registry = RuleBindingRegistry::new().with_binding("use", ALL_SCOPES);

        assert!(registry.is_in_scope("use", "catalog"));
        assert!(registry.is_in_scope("use", "transfer.provision"));
    }

    #[test]
    fn test_multiple_scopes_per_key() {
        let registry = RuleBindingRegistry::new()
            .with_binding("region", "catalog")
            .with_binding("region", "transfer.provision");

        assert!(registry.is_in_scope("region", "catalog.filter"));
        assert!(registry.is_in_scope("region", "transfer.provision"));
        assert!(!registry.is_in_scope("region", "transfer"));
        assert_eq!(registry.scopes_for("region").len(), 2);
    }

    #[test]
    fn test_bind_is_idempotent() {
        let mut once = RuleBindingRegistry::new();
        once.bind("region", "catalog");

        let mut twice = RuleBindingRegistry::new();
        twice.bind("region", "catalog");
        twice.bind("region", "catalog");

        assert_eq!(once.scopes_for("region"), twice.scopes_for("region"));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_keys_sorted() {
        let registry = RuleBindingRegistry::new()
            .with_binding("b", "x")
            .with_binding("a", "y");
        assert_eq!(registry.keys(), vec!["a", "b"]);
        assert!(!registry.is_empty());
    }
}
