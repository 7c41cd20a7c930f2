//! Hierarchical scopes and scope filtering.
//!
//! A scope is a dot-delimited path such as `catalog.contract-offer`. Anything
//! registered for a scope also applies to every scope below it, so `catalog`
//! covers `catalog.contract-offer.filter` but not `catalogue` or `cat`.
//! Matching compares whole segments, never string prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::RuleBindingRegistry;
use crate::model::{
    AtomicConstraint, Constraint, Duty, LogicalConstraint, Permission, Policy, Prohibition,
};

/// Wildcard scope matching every evaluation scope.
pub const ALL_SCOPES: &str = "*";

const SEPARATOR: char = '.';

// ============================================================================
// Scope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// The wildcard scope.
    pub fn all() -> Self {
        Self(ALL_SCOPES.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.0 == ALL_SCOPES
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// The enclosing scope, or `None` for a top-level scope.
    pub fn parent(&self) -> Option<Scope> {
        if self.is_all() {
            return None;
        }
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| Scope::new(parent))
    }

    /// True if `other` is this scope or lies below it.
    pub fn contains(&self, other: &str) -> bool {
        matches(&self.0, other)
    }

    /// True if every segment is non-empty (`a..b` and `a.` are malformed).
    pub fn is_well_formed(&self) -> bool {
        self.is_all() || self.segments().all(|s| !s.is_empty() && s != ALL_SCOPES)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returns true if something registered under `registered` applies when
/// evaluating in `evaluated`.
///
/// `registered` matches when it is [`ALL_SCOPES`], or when its segments are a
/// leading run of `evaluated`'s segments.
pub fn matches(registered: &str, evaluated: &str) -> bool {
    if registered == ALL_SCOPES {
        return true;
    }

    let mut target = evaluated.split(SEPARATOR);
    registered
        .split(SEPARATOR)
        .all(|segment| target.next() == Some(segment))
}

// ============================================================================
// Scope Filter
// ============================================================================

/// How keys with no binding at all are treated by the scope filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnboundKeys {
    /// Unbound keys are out of scope everywhere.
    #[default]
    Exclude,
    /// Unbound keys are in scope everywhere; a key becomes an allow-list as
    /// soon as any binding exists for it.
    Include,
}

/// Prunes a policy down to the rules and constraints active in a scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopeFilter<'a> {
    bindings: &'a RuleBindingRegistry,
    unbound: UnboundKeys,
}

impl<'a> ScopeFilter<'a> {
    pub fn new(bindings: &'a RuleBindingRegistry) -> Self {
        Self {
            bindings,
            unbound: UnboundKeys::default(),
        }
    }

    pub fn with_unbound_keys(mut self, unbound: UnboundKeys) -> Self {
        self.unbound = unbound;
        self
    }

    /// Returns a copy of `policy` holding only what is active in `scope`.
    ///
    /// Rules are kept when their action type is in scope (rules without an
    /// action are always kept). Atomic constraints are kept when their left
    /// operand is in scope; logical constraints are kept when at least one
    /// child survives, with only the surviving children. A conditional
    /// prohibition left with no in-scope condition is dropped.
    pub fn filter(&self, policy: &Policy, scope: &str) -> Policy {
        let permissions = policy
            .permissions()
            .iter()
            .filter_map(|p| self.filter_permission(p, scope))
            .collect::<Vec<_>>();
        let prohibitions = policy
            .prohibitions()
            .iter()
            .filter_map(|p| self.filter_prohibition(p, scope))
            .collect::<Vec<_>>();
        let obligations = policy
            .obligations()
            .iter()
            .filter_map(|d| self.filter_duty(d, scope))
            .collect::<Vec<_>>();

        policy
            .to_builder()
            .clear_rules()
            .permissions(permissions)
            .prohibitions(prohibitions)
            .duties(obligations)
            .build()
    }

    fn is_in_scope(&self, key: &str, scope: &str) -> bool {
        if self.bindings.is_in_scope(key, scope) {
            return true;
        }
        self.unbound == UnboundKeys::Include && !self.bindings.is_bound(key)
    }

    fn action_in_scope(&self, action_type: Option<&str>, scope: &str) -> bool {
        match action_type {
            Some(key) => {
                let in_scope = self.is_in_scope(key, scope);
                if !in_scope {
                    debug!(key = %key, scope = %scope, "Rule filtered out of scope");
                }
                in_scope
            }
            None => true,
        }
    }

    fn filter_permission(&self, permission: &Permission, scope: &str) -> Option<Permission> {
        let action_type = permission.action.as_ref().map(|a| a.action_type.as_str());
        if !self.action_in_scope(action_type, scope) {
            return None;
        }

        Some(Permission {
            action: permission.action.clone(),
            constraints: self.filter_constraints(&permission.constraints, scope),
            duties: permission
                .duties
                .iter()
                .filter_map(|d| self.filter_duty(d, scope))
                .collect(),
        })
    }

    fn filter_prohibition(&self, prohibition: &Prohibition, scope: &str) -> Option<Prohibition> {
        let action_type = prohibition.action.as_ref().map(|a| a.action_type.as_str());
        if !self.action_in_scope(action_type, scope) {
            return None;
        }

        // A prohibition whose every condition is out of scope is dropped, not
        // turned into an unconditional ban.
        let constraints = self.filter_constraints(&prohibition.constraints, scope);
        if constraints.is_empty() && !prohibition.constraints.is_empty() {
            debug!(scope = %scope, "Prohibition conditions all out of scope, rule dropped");
            return None;
        }

        Some(Prohibition {
            action: prohibition.action.clone(),
            constraints,
        })
    }

    fn filter_duty(&self, duty: &Duty, scope: &str) -> Option<Duty> {
        let action_type = duty.action.as_ref().map(|a| a.action_type.as_str());
        if !self.action_in_scope(action_type, scope) {
            return None;
        }

        Some(Duty {
            action: duty.action.clone(),
            constraints: self.filter_constraints(&duty.constraints, scope),
        })
    }

    fn filter_constraints(&self, constraints: &[Constraint], scope: &str) -> Vec<Constraint> {
        constraints
            .iter()
            .filter_map(|c| self.filter_constraint(c, scope))
            .collect()
    }

    fn filter_constraint(&self, constraint: &Constraint, scope: &str) -> Option<Constraint> {
        match constraint {
            Constraint::Atomic(atomic) => self.filter_atomic(atomic, scope),
            Constraint::Logical(logical) => {
                let children = self.filter_constraints(&logical.constraints, scope);
                if children.is_empty() {
                    return None;
                }
                Some(Constraint::Logical(LogicalConstraint {
                    operator: logical.operator,
                    constraints: children,
                }))
            }
        }
    }

    fn filter_atomic(&self, atomic: &AtomicConstraint, scope: &str) -> Option<Constraint> {
        let key = atomic.key();
        if self.is_in_scope(&key, scope) {
            Some(Constraint::Atomic(atomic.clone()))
        } else {
            debug!(key = %key, scope = %scope, "Constraint filtered out of scope");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
