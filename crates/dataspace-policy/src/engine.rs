//! Policy evaluation engine.
//!
//! Evaluation is a fixed pipeline with no I/O:
//!
//! 1. Pre-validators for the scope run against the unfiltered policy. The
//!    first rejection ends the evaluation.
//! 2. The policy is pruned to the rules and constraints bound to the scope.
//! 3. Permissions must be granted, prohibitions must not be triggered,
//!    obligations must be satisfied. Every rule is evaluated even after a
//!    failure so the caller gets every reason at once.
//! 4. Post-validators run against the filtered policy.
//!
//! An in-scope atomic constraint with no function to evaluate it aborts the
//! evaluation with [`PolicyError::MissingFunction`].

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::binding::RuleBindingRegistry;
use crate::context::{ParticipantAgent, PolicyContext};
use crate::error::{Failure, FailureKind, PolicyError, Result};
use crate::model::{AtomicConstraint, Constraint, Permission, Policy, Rule};
use crate::registry::FunctionRegistry;
use crate::scope::{ScopeFilter, UnboundKeys};

// ============================================================================
// Settings
// ============================================================================

/// Engine behaviour that is fixed at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Treatment of rule keys with no binding at all.
    pub unbound_keys: UnboundKeys,
    /// Whether verdicts are logged at info/warn level.
    pub audit: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            unbound_keys: UnboundKeys::Exclude,
            audit: true,
        }
    }
}

// ============================================================================
// Policy Engine
// ============================================================================

/// Evaluates policies against bound rules and registered functions.
///
/// # Thread Safety
///
/// `PolicyEngine` is `Send + Sync` and `evaluate` takes `&self`, so one
/// engine can serve concurrent evaluations. Registration goes through
/// `&mut self`; wrap the engine in a lock if it must change after bootstrap.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    bindings: RuleBindingRegistry,
    functions: FunctionRegistry,
    settings: EngineSettings,
}

impl PolicyEngine {
    pub fn new(bindings: RuleBindingRegistry, functions: FunctionRegistry) -> Self {
        Self {
            bindings,
            functions,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.settings.audit = false;
        self
    }

    pub fn bindings(&self) -> &RuleBindingRegistry {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut RuleBindingRegistry {
        &mut self.bindings
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the part of `policy` that is active in `scope`.
    pub fn filter(&self, policy: &Policy, scope: &str) -> Policy {
        ScopeFilter::new(&self.bindings)
            .with_unbound_keys(self.settings.unbound_keys)
            .filter(policy, scope)
    }

    /// Evaluates `policy` in `scope` on behalf of `agent`.
    ///
    /// Returns `Ok(())` if the policy permits the request.
    pub fn evaluate(&self, scope: &str, policy: &Policy, agent: &ParticipantAgent) -> Result<()> {
        let mut context = PolicyContext::new(agent.clone());
        self.evaluate_with_context(scope, policy, &mut context)
    }

    /// Evaluates with a caller-prepared context.
    ///
    /// Problems reported into the context during the evaluation are moved
    /// into the returned failures.
    pub fn evaluate_with_context(
        &self,
        scope: &str,
        policy: &Policy,
        context: &mut PolicyContext,
    ) -> Result<()> {
        // 1. Pre-validation (fail fast)
        for (index, validator) in self.functions.pre_validators(scope).enumerate() {
            if !validator(policy, context) {
                debug!(scope = %scope, validator = index + 1, "Pre-validation rejected policy");
                let failure = Failure::new(
                    FailureKind::PreValidation,
                    format!("pre-validator #{} rejected the policy", index + 1),
                );
                return Err(self.deny(scope, vec![failure], context));
            }
        }

        // 2. Scope filtering
        let filtered = self.filter(policy, scope);
        debug!(
            scope = %scope,
            permissions = filtered.permissions().len(),
            prohibitions = filtered.prohibitions().len(),
            obligations = filtered.obligations().len(),
            "Policy filtered to scope"
        );

        // Problems reported before a configuration error are discarded.
        let failures = match self.evaluate_rules(scope, &filtered, context) {
            Ok(failures) => failures,
            Err(err) => {
                context.take_problems();
                return Err(err);
            }
        };

        if failures.is_empty() && !context.has_problems() {
            if self.settings.audit {
                info!(
                    scope = %scope,
                    policy = ?policy.uid(),
                    participant = ?context.agent().identity(),
                    "Policy permitted"
                );
            }
            Ok(())
        } else {
            Err(self.deny(scope, failures, context))
        }
    }

    /// Checks, independent of any scope, that the engine can evaluate `policy`.
    ///
    /// Reports every action type and constraint key that has no binding
    /// (unless unbound keys are included by the settings) and every
    /// constraint key with no function of its rule's kind in any scope.
    pub fn validate(&self, policy: &Policy) -> Result<()> {
        let mut issues: Vec<String> = Vec::new();
        let mut push = |issue: String| {
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        };
        let require_binding = self.settings.unbound_keys == UnboundKeys::Exclude;

        let nested = policy
            .permissions()
            .iter()
            .flat_map(|p| p.duties.iter().map(Rule::Duty));

        for rule in policy.rules().chain(nested) {
            if let Some(key) = rule.key() {
                if require_binding && !self.bindings.is_bound(key) {
                    push(format!("action '{key}' is not bound to any scope"));
                }
            }

            for constraint in rule.constraints() {
                constraint.for_each_atomic(&mut |atomic| {
                    let key = atomic.key();
                    let kind = rule.kind();
                    if require_binding && !self.bindings.is_bound(&key) {
                        push(format!("constraint key '{key}' is not bound to any scope"));
                    }
                    if !self.functions.has_constraint_function(kind, &key) {
                        push(format!(
                            "no {kind} function registered for constraint key '{key}'"
                        ));
                    }
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Invalid { issues })
        }
    }

    /// Runs rule evaluation and post-validation over a filtered policy.
    fn evaluate_rules(
        &self,
        scope: &str,
        filtered: &Policy,
        context: &mut PolicyContext,
    ) -> Result<Vec<Failure>> {
        let evaluator = Evaluator {
            functions: &self.functions,
            scope,
        };
        let mut failures = Vec::new();

        // 3. Permissions
        for permission in filtered.permissions() {
            if !evaluator.permission_granted(permission, context)? {
                failures.push(Failure::new(
                    FailureKind::PermissionNotGranted,
                    format!("{} not granted", Rule::Permission(permission).describe()),
                ));
            }
        }

        // 4. Prohibitions
        for prohibition in filtered.prohibitions() {
            let rule = Rule::Prohibition(prohibition);
            if evaluator.rule_holds(rule, context)? {
                failures.push(Failure::new(
                    FailureKind::ProhibitionTriggered,
                    format!("{} triggered", rule.describe()),
                ));
            }
        }

        // 5. Obligations
        for duty in filtered.obligations() {
            let rule = Rule::Duty(duty);
            if !evaluator.rule_holds(rule, context)? {
                failures.push(Failure::new(
                    FailureKind::DutyUnsatisfied,
                    format!("{} not fulfilled", rule.describe()),
                ));
            }
        }

        // 6. Post-validation
        for (index, validator) in self.functions.post_validators(scope).enumerate() {
            if !validator(filtered, context) {
                failures.push(Failure::new(
                    FailureKind::PostValidation,
                    format!("post-validator #{} rejected the policy", index + 1),
                ));
            }
        }

        Ok(failures)
    }

    fn deny(
        &self,
        scope: &str,
        mut failures: Vec<Failure>,
        context: &mut PolicyContext,
    ) -> PolicyError {
        failures.extend(
            context
                .take_problems()
                .into_iter()
                .map(|problem| Failure::new(FailureKind::Reported, problem)),
        );

        if self.settings.audit {
            let reasons: Vec<&str> = failures.iter().map(|f| f.message.as_str()).collect();
            warn!(
                scope = %scope,
                participant = ?context.agent().identity(),
                failures = ?reasons,
                "Policy denied"
            );
        }

        PolicyError::Denied {
            scope: scope.to_string(),
            failures,
        }
    }
}

// ============================================================================
// Rule Evaluation
// ============================================================================

struct Evaluator<'e> {
    functions: &'e FunctionRegistry,
    scope: &'e str,
}

impl Evaluator<'_> {
    /// A permission is granted when it holds and every nested duty holds.
    fn permission_granted(
        &self,
        permission: &Permission,
        context: &mut PolicyContext,
    ) -> Result<bool> {
        let mut granted = self.rule_holds(Rule::Permission(permission), context)?;

        for duty in &permission.duties {
            let rule = Rule::Duty(duty);
            if !self.rule_holds(rule, context)? {
                debug!(scope = %self.scope, duty = %rule.describe(), "Permission duty not fulfilled");
                granted = false;
            }
        }

        Ok(granted)
    }

    /// Every applicable function and every constraint must hold.
    ///
    /// All functions are invoked even after one returns false.
    fn rule_holds(&self, rule: Rule<'_>, context: &mut PolicyContext) -> Result<bool> {
        let kind = rule.kind();
        let mut holds = true;

        for function in self.functions.rule_functions(self.scope, kind) {
            holds &= function(rule, context);
        }

        if let Some(action_type) = rule.key() {
            for function in self.functions.action_functions(self.scope, kind, action_type) {
                holds &= function(rule, context);
            }
        }

        for constraint in rule.constraints() {
            holds &= self.constraint_holds(constraint, rule, context)?;
        }

        Ok(holds)
    }

    fn constraint_holds(
        &self,
        constraint: &Constraint,
        rule: Rule<'_>,
        context: &mut PolicyContext,
    ) -> Result<bool> {
        match constraint {
            Constraint::Atomic(atomic) => self.atomic_holds(atomic, rule, context),
            Constraint::Logical(logical) => {
                let mut results = Vec::with_capacity(logical.constraints.len());
                for child in &logical.constraints {
                    results.push(self.constraint_holds(child, rule, context)?);
                }
                Ok(logical.operator.combine(&results))
            }
        }
    }

    fn atomic_holds(
        &self,
        atomic: &AtomicConstraint,
        rule: Rule<'_>,
        context: &mut PolicyContext,
    ) -> Result<bool> {
        let kind = rule.kind();
        let key = atomic.key();
        let right = atomic.right.value();

        let mut found = false;
        let mut holds = true;

        for function in self.functions.constraint_functions(self.scope, kind, &key) {
            found = true;
            holds &= function(atomic.operator, right, rule, context);
        }

        if !found {
            for function in self.functions.dynamic_functions(self.scope, kind) {
                if function.can_handle(&key) {
                    found = true;
                    holds &= function.evaluate(&key, atomic.operator, right, rule, context);
                }
            }
        }

        if !found {
            error!(scope = %self.scope, kind = %kind, key = %key, "No function found for constraint");
            return Err(PolicyError::MissingFunction {
                scope: self.scope.to_string(),
                kind,
                key,
            });
        }

        Ok(holds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.unbound_keys, UnboundKeys::Exclude);
        assert!(settings.audit);
    }

    #[test]
    fn test_without_audit() {
        let engine = PolicyEngine::default().without_audit();
        assert!(!engine.settings().audit);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "unbound_keys": "include" }"#).expect("deserialize settings");
        assert_eq!(settings.unbound_keys, UnboundKeys::Include);
        assert!(settings.audit);
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyEngine>();
    }
}
