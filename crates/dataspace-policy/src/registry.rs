//! Function registry.
//!
//! Evaluation functions are registered under a scope and looked up for an
//! evaluation scope: every function whose registration scope contains the
//! evaluation scope applies, in registration order.
//!
//! | Function | Keyed by | Decides |
//! |----------|----------|---------|
//! | rule function | (scope, kind) | the whole rule |
//! | action function | (scope, kind, action type) | the whole rule |
//! | constraint function | (scope, kind, left operand) | one atomic constraint |
//! | dynamic function | (scope, kind) + `can_handle` | atomic constraints with no keyed function |
//! | pre/post validator | scope | the whole policy |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::PolicyContext;
use crate::model::{Operator, Policy, Rule, RuleKind};
use crate::scope::Scope;

/// Decides whether a whole rule holds.
pub type RuleFunction = Arc<dyn Fn(Rule<'_>, &mut PolicyContext) -> bool + Send + Sync>;

/// Decides one atomic constraint: `(operator, right operand, rule, context)`.
pub type ConstraintFunction =
    Arc<dyn Fn(Operator, &Value, Rule<'_>, &mut PolicyContext) -> bool + Send + Sync>;

/// Gates a whole policy before or after rule evaluation.
pub type PolicyValidator = Arc<dyn Fn(&Policy, &mut PolicyContext) -> bool + Send + Sync>;

/// A constraint function that decides at runtime which left operands it handles.
pub trait DynamicConstraintFunction: Send + Sync {
    fn can_handle(&self, left_operand: &str) -> bool;

    fn evaluate(
        &self,
        left_operand: &str,
        operator: Operator,
        right: &Value,
        rule: Rule<'_>,
        context: &mut PolicyContext,
    ) -> bool;
}

/// Composite lookup key. `key` is `None` for class-level rule functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FunctionKey {
    kind: RuleKind,
    key: Option<String>,
}

impl FunctionKey {
    fn class(kind: RuleKind) -> Self {
        Self { kind, key: None }
    }

    fn keyed(kind: RuleKind, key: &str) -> Self {
        Self {
            kind,
            key: Some(key.to_string()),
        }
    }
}

#[derive(Clone)]
struct Scoped<F> {
    scope: Scope,
    function: F,
}

fn in_scope<'a, F>(
    entries: Option<&'a Vec<Scoped<F>>>,
    scope: &'a str,
) -> impl Iterator<Item = &'a F> + 'a {
    entries
        .into_iter()
        .flatten()
        .filter(move |entry| entry.scope.contains(scope))
        .map(|entry| &entry.function)
}

// ============================================================================
// Function Registry
// ============================================================================

/// Scoped evaluation functions and policy validators.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    rule_functions: HashMap<FunctionKey, Vec<Scoped<RuleFunction>>>,
    constraint_functions: HashMap<FunctionKey, Vec<Scoped<ConstraintFunction>>>,
    dynamic_functions: HashMap<RuleKind, Vec<Scoped<Arc<dyn DynamicConstraintFunction>>>>,
    pre_validators: Vec<Scoped<PolicyValidator>>,
    post_validators: Vec<Scoped<PolicyValidator>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Registers a class-level function deciding every `kind` rule in `scope`.
    pub fn register_rule_function<F>(&mut self, scope: impl Into<Scope>, kind: RuleKind, function: F)
    where
        F: Fn(Rule<'_>, &mut PolicyContext) -> bool + Send + Sync + 'static,
    {
        let scope = scope.into();
        let function: RuleFunction = Arc::new(function);
        debug!(scope = %scope, kind = %kind, "Rule function registered");
        self.rule_functions
            .entry(FunctionKey::class(kind))
            .or_default()
            .push(Scoped { scope, function });
    }

    /// Registers a function deciding `kind` rules whose action type is `action_type`.
    pub fn register_action_function<F>(
        &mut self,
        scope: impl Into<Scope>,
        kind: RuleKind,
        action_type: &str,
        function: F,
    ) where
        F: Fn(Rule<'_>, &mut PolicyContext) -> bool + Send + Sync + 'static,
    {
        let scope = scope.into();
        let function: RuleFunction = Arc::new(function);
        debug!(scope = %scope, kind = %kind, action = %action_type, "Action function registered");
        self.rule_functions
            .entry(FunctionKey::keyed(kind, action_type))
            .or_default()
            .push(Scoped { scope, function });
    }

    /// Registers a function evaluating atomic constraints with left operand
    /// `left_operand` attached to `kind` rules.
    pub fn register_constraint_function<F>(
        &mut self,
        scope: impl Into<Scope>,
        kind: RuleKind,
        left_operand: &str,
        function: F,
    ) where
        F: Fn(Operator, &Value, Rule<'_>, &mut PolicyContext) -> bool + Send + Sync + 'static,
    {
        let scope = scope.into();
        let function: ConstraintFunction = Arc::new(function);
        debug!(scope = %scope, kind = %kind, key = %left_operand, "Constraint function registered");
        self.constraint_functions
            .entry(FunctionKey::keyed(kind, left_operand))
            .or_default()
            .push(Scoped { scope, function });
    }

    pub fn register_dynamic_function(
        &mut self,
        scope: impl Into<Scope>,
        kind: RuleKind,
        function: impl DynamicConstraintFunction + 'static,
    ) {
        let scope = scope.into();
        let function: Arc<dyn DynamicConstraintFunction> = Arc::new(function);
        debug!(scope = %scope, kind = %kind, "Dynamic constraint function registered");
        self.dynamic_functions
            .entry(kind)
            .or_default()
            .push(Scoped { scope, function });
    }

    /// Registers a validator run against the unfiltered policy before rule evaluation.
    pub fn register_pre_validator<F>(&mut self, scope: impl Into<Scope>, validator: F)
    where
        F: Fn(&Policy, &mut PolicyContext) -> bool + Send + Sync + 'static,
    {
        let function: PolicyValidator = Arc::new(validator);
        self.pre_validators.push(Scoped {
            scope: scope.into(),
            function,
        });
    }

    /// Registers a validator run against the filtered policy after rule evaluation.
    pub fn register_post_validator<F>(&mut self, scope: impl Into<Scope>, validator: F)
    where
        F: Fn(&Policy, &mut PolicyContext) -> bool + Send + Sync + 'static,
    {
        let function: PolicyValidator = Arc::new(validator);
        self.post_validators.push(Scoped {
            scope: scope.into(),
            function,
        });
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn rule_functions<'a>(
        &'a self,
        scope: &'a str,
        kind: RuleKind,
    ) -> impl Iterator<Item = &'a RuleFunction> + 'a {
        in_scope(self.rule_functions.get(&FunctionKey::class(kind)), scope)
    }

    pub fn action_functions<'a>(
        &'a self,
        scope: &'a str,
        kind: RuleKind,
        action_type: &str,
    ) -> impl Iterator<Item = &'a RuleFunction> + use<'a> {
        in_scope(
            self.rule_functions
                .get(&FunctionKey::keyed(kind, action_type)),
            scope,
        )
    }

    pub fn constraint_functions<'a>(
        &'a self,
        scope: &'a str,
        kind: RuleKind,
        left_operand: &str,
    ) -> impl Iterator<Item = &'a ConstraintFunction> + use<'a> {
        in_scope(
            self.constraint_functions
                .get(&FunctionKey::keyed(kind, left_operand)),
            scope,
        )
    }

    pub fn dynamic_functions<'a>(
        &'a self,
        scope: &'a str,
        kind: RuleKind,
    ) -> impl Iterator<Item = &'a Arc<dyn DynamicConstraintFunction>> + 'a {
        in_scope(self.dynamic_functions.get(&kind), scope)
    }

    pub fn pre_validators<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a PolicyValidator> + 'a {
        in_scope(Some(&self.pre_validators), scope)
    }

    pub fn post_validators<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a PolicyValidator> + 'a {
        in_scope(Some(&self.post_validators), scope)
    }

    /// True if any scope has a keyed or dynamic function of `kind` able to
    /// evaluate `left_operand`.
    pub fn has_constraint_function(&self, kind: RuleKind, left_operand: &str) -> bool {
        let keyed = self
            .constraint_functions
            .get(&FunctionKey::keyed(kind, left_operand))
            .is_some_and(|entries| !entries.is_empty());

        keyed
            || self
                .dynamic_functions
                .get(&kind)
                .is_some_and(|entries| {
                    entries
                        .iter()
                        .any(|entry| entry.function.can_handle(left_operand))
                })
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field(
                "rule_functions",
                &self.rule_functions.values().map(Vec::len).sum::<usize>(),
            )
            .field(
                "constraint_functions",
                &self.constraint_functions.values().map(Vec::len).sum::<usize>(),
            )
            .field(
                "dynamic_functions",
                &self.dynamic_functions.values().map(Vec::len).sum::<usize>(),
            )
            .field("pre_validators", &self.pre_validators.len())
            .field("post_validators", &self.post_validators.len())
            .finish()
    }
}
