//! Built-in constraint functions.
//!
//! Neither is registered automatically. Connectors register them for the
//! scopes and rule kinds they need, or wire them from configuration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::context::PolicyContext;
use crate::model::{Operator, Rule};
use crate::registry::DynamicConstraintFunction;

/// Left operand conventionally used for [`evaluation_time`].
pub const EVALUATION_TIME_KEY: &str = "evaluation_time";

// ============================================================================
// Claim Constraints
// ============================================================================

/// Compares a participant claim with the constraint's right operand.
///
/// Each handled left operand maps to the name of the claim it reads. A
/// participant without the claim fails the constraint.
///
/// # Examples
///
/// ```
/// use dataspace_policy::builtin::ClaimConstraintFunction;
/// use dataspace_policy::registry::DynamicConstraintFunction;
///
/// let function = ClaimConstraintFunction::new()
///     .with_claim("region", "region")
///     .with_claim("membership", "membership_level");
///
/// assert!(function.can_handle("membership"));
/// assert!(!function.can_handle("purpose"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClaimConstraintFunction {
    claims: HashMap<String, String>,
}

impl ClaimConstraintFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles `left_operand` by comparing the participant's `claim`.
    pub fn with_claim(mut self, left_operand: impl Into<String>, claim: impl Into<String>) -> Self {
        self.claims.insert(left_operand.into(), claim.into());
        self
    }

    /// The claim read for `left_operand`.
    pub fn claim_for(&self, left_operand: &str) -> Option<&str> {
        self.claims.get(left_operand).map(String::as_str)
    }
}

impl DynamicConstraintFunction for ClaimConstraintFunction {
    fn can_handle(&self, left_operand: &str) -> bool {
        self.claims.contains_key(left_operand)
    }

    fn evaluate(
        &self,
        left_operand: &str,
        operator: Operator,
        right: &Value,
        _rule: Rule<'_>,
        context: &mut PolicyContext,
    ) -> bool {
        let Some(claim) = self.claim_for(left_operand) else {
            return false;
        };

        match context.agent().claim(claim) {
            Some(value) => operator.apply(value, right),
            None => {
                debug!(claim = %claim, "Participant does not carry claim");
                false
            }
        }
    }
}

// ============================================================================
// Evaluation Time
// ============================================================================

/// Compares the evaluation timestamp with an RFC 3339 right operand.
///
/// Supports `eq`, `neq`, `gt`, `geq`, `lt` and `leq`. A malformed right
/// operand or any other operator reports a problem and fails.
///
/// ```
/// use dataspace_policy::builtin::{evaluation_time, EVALUATION_TIME_KEY};
/// use dataspace_policy::model::RuleKind;
/// use dataspace_policy::registry::FunctionRegistry;
///
/// let mut functions = FunctionRegistry::new();
/// functions.register_constraint_function(
///     "contract.negotiation",
///     RuleKind::Permission,
///     EVALUATION_TIME_KEY,
///     evaluation_time,
/// );
/// ```
pub fn evaluation_time(
    operator: Operator,
    right: &Value,
    _rule: Rule<'_>,
    context: &mut PolicyContext,
) -> bool {
    let Some(bound) = right.as_str().and_then(parse_timestamp) else {
        context.report_problem(format!("'{right}' is not an RFC 3339 timestamp"));
        return false;
    };

    let now = context.evaluated_at();
    match operator {
        Operator::Eq => now == bound,
        Operator::Neq => now != bound,
        Operator::Gt => now > bound,
        Operator::Geq => now >= bound,
        Operator::Lt => now < bound,
        Operator::Leq => now <= bound,
        other => {
            context.report_problem(format!("operator '{other}' is not supported for evaluation time"));
            false
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
