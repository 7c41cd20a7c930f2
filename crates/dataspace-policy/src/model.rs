//! Policy model.
//!
//! A [`Policy`] is an immutable tree: permissions, prohibitions and
//! obligations at the top, each carrying an [`Action`] and a list of
//! [`Constraint`]s. Constraints are either atomic comparisons or logical
//! combinations of further constraints. The tree is built top-down, so it
//! cannot contain cycles.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

// ============================================================================
// Rule Kind
// ============================================================================

/// The rule variant a function is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Allowed if satisfied.
    Permission,
    /// Forbidden if triggered.
    Prohibition,
    /// Must be fulfilled.
    Duty,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Permission => "permission",
            Self::Prohibition => "prohibition",
            Self::Duty => "duty",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Expressions & Operators
// ============================================================================

/// A literal operand of an atomic constraint.
///
/// The left operand usually names an attribute (`"region"`), the right
/// operand carries the value it is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiteralExpression(pub Value);

impl LiteralExpression {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Returns the binding key this expression names.
    ///
    /// String literals are used verbatim; other values use their JSON rendering.
    pub fn as_key(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for LiteralExpression {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<Value> for LiteralExpression {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for LiteralExpression {
                fn from(value: $ty) -> Self {
                    Self(Value::from(value))
                }
            }
        )*
    };
}

// Non-finite floats become null.
literal_from!(i32, i64, u32, u64, f64, bool);

/// Comparison operator of an atomic constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Geq,
    Lt,
    Leq,
    In,
    HasPart,
    IsA,
    IsAllOf,
    IsAnyOf,
    IsNoneOf,
}

impl Operator {
    /// Applies the operator to two JSON values.
    ///
    /// The engine itself never calls this; it is the comparison used by the
    /// built-in constraint functions and is available to custom ones.
    ///
    /// - `Eq`/`Neq`/`IsA`: JSON equality, numbers compared by value
    /// - `Gt`/`Geq`/`Lt`/`Leq`: numeric for numbers, lexicographic for
    ///   strings, false for anything else
    /// - `In`: left is an element of the right array (or equals a scalar)
    /// - `HasPart`: substring for strings, element containment for arrays
    /// - `IsAllOf`: the left set contains every element of the right set
    /// - `IsAnyOf`/`IsNoneOf`: the sets intersect / are disjoint
    ///
    /// Scalars are treated as one-element sets by the set operators.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq | Self::IsA => values_equal(left, right),
            Self::Neq => !values_equal(left, right),
            Self::Gt => compare(left, right).is_some_and(Ordering::is_gt),
            Self::Geq => compare(left, right).is_some_and(Ordering::is_ge),
            Self::Lt => compare(left, right).is_some_and(Ordering::is_lt),
            Self::Leq => compare(left, right).is_some_and(Ordering::is_le),
            Self::In => match right {
                Value::Array(items) => items.iter().any(|item| values_equal(left, item)),
                scalar => values_equal(left, scalar),
            },
            Self::HasPart => match (left, right) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                _ => false,
            },
            Self::IsAllOf => {
                let have = as_set(left);
                as_set(right)
                    .iter()
                    .all(|wanted| have.iter().any(|h| values_equal(h, wanted)))
            }
            Self::IsAnyOf => intersects(left, right),
            Self::IsNoneOf => !intersects(left, right),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Geq => "geq",
            Self::Lt => "lt",
            Self::Leq => "leq",
            Self::In => "in",
            Self::HasPart => "has_part",
            Self::IsA => "is_a",
            Self::IsAllOf => "is_all_of",
            Self::IsAnyOf => "is_any_of",
            Self::IsNoneOf => "is_none_of",
        };
        f.write_str(symbol)
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b).is_some_and(Ordering::is_eq),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Integers compare exactly; floats only when either side is one.
fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn as_integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

fn as_set(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        scalar => vec![scalar],
    }
}

fn intersects(left: &Value, right: &Value) -> bool {
    let right = as_set(right);
    as_set(left)
        .iter()
        .any(|l| right.iter().any(|r| values_equal(l, r)))
}

// ============================================================================
// Constraints
// ============================================================================

/// `leftExpression operator rightExpression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicConstraint {
    pub left: LiteralExpression,
    pub operator: Operator,
    pub right: LiteralExpression,
}

impl AtomicConstraint {
    pub fn new(
        left: impl Into<LiteralExpression>,
        operator: Operator,
        right: impl Into<LiteralExpression>,
    ) -> Self {
        Self {
            left: left.into(),
            operator,
            right: right.into(),
        }
    }

    /// The binding key of this constraint (its left operand).
    pub fn key(&self) -> String {
        self.left.as_key()
    }
}

/// How a logical constraint combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    /// Every child must hold. Vacuously true with no children.
    And,
    /// At least one child must hold.
    Or,
    /// Exactly one child must hold.
    Xone,
}

impl LogicalOperator {
    /// Combines already-evaluated child results.
    pub fn combine(self, results: &[bool]) -> bool {
        match self {
            Self::And => results.iter().all(|r| *r),
            Self::Or => results.iter().any(|r| *r),
            Self::Xone => results.iter().filter(|r| **r).count() == 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalConstraint {
    pub operator: LogicalOperator,
    pub constraints: Vec<Constraint>,
}

/// A condition attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Atomic(AtomicConstraint),
    Logical(LogicalConstraint),
}

impl Constraint {
    /// Shorthand for an atomic constraint.
    pub fn atomic(
        left: impl Into<LiteralExpression>,
        operator: Operator,
        right: impl Into<LiteralExpression>,
    ) -> Self {
        Self::Atomic(AtomicConstraint::new(left, operator, right))
    }

    pub fn and(constraints: Vec<Constraint>) -> Self {
        Self::logical(LogicalOperator::And, constraints)
    }

    pub fn or(constraints: Vec<Constraint>) -> Self {
        Self::logical(LogicalOperator::Or, constraints)
    }

    pub fn xone(constraints: Vec<Constraint>) -> Self {
        Self::logical(LogicalOperator::Xone, constraints)
    }

    pub fn logical(operator: LogicalOperator, constraints: Vec<Constraint>) -> Self {
        Self::Logical(LogicalConstraint {
            operator,
            constraints,
        })
    }

    /// Visits every atomic constraint in this tree, depth first.
    pub fn for_each_atomic<'a>(&'a self, visit: &mut impl FnMut(&'a AtomicConstraint)) {
        match self {
            Self::Atomic(atomic) => visit(atomic),
            Self::Logical(logical) => {
                for child in &logical.constraints {
                    child.for_each_atomic(visit);
                }
            }
        }
    }
}

// ============================================================================
// Actions & Rules
// ============================================================================

/// What a rule is about, e.g. `"use"` or `"distribute"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    /// Broader action this one refines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_in: Option<String>,
    /// Refinement carried as data; not evaluated by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            included_in: None,
            constraint: None,
        }
    }

    pub fn included_in(mut self, parent: impl Into<String>) -> Self {
        self.included_in = Some(parent.into());
        self
    }

    pub fn with_refinement(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Post-duties that become active once the permission is exercised.
    #[serde(default)]
    pub duties: Vec<Duty>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prohibition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Duty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Permission {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_duty(mut self, duty: Duty) -> Self {
        self.duties.push(duty);
        self
    }
}

impl Prohibition {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

impl Duty {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// A borrowed view over any rule variant.
///
/// This is what evaluation functions receive; matching on it is exhaustive
/// over the three ODRL rule kinds.
#[derive(Debug, Clone, Copy)]
pub enum Rule<'a> {
    Permission(&'a Permission),
    Prohibition(&'a Prohibition),
    Duty(&'a Duty),
}

impl<'a> Rule<'a> {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Permission(_) => RuleKind::Permission,
            Self::Prohibition(_) => RuleKind::Prohibition,
            Self::Duty(_) => RuleKind::Duty,
        }
    }

    pub fn action(&self) -> Option<&'a Action> {
        match self {
            Self::Permission(p) => p.action.as_ref(),
            Self::Prohibition(p) => p.action.as_ref(),
            Self::Duty(d) => d.action.as_ref(),
        }
    }

    pub fn constraints(&self) -> &'a [Constraint] {
        match self {
            Self::Permission(p) => &p.constraints,
            Self::Prohibition(p) => &p.constraints,
            Self::Duty(d) => &d.constraints,
        }
    }

    /// The binding key of the rule: its action type, if it has an action.
    pub fn key(&self) -> Option<&'a str> {
        self.action().map(|a| a.action_type.as_str())
    }

    /// A short label for diagnostics, e.g. `permission 'use'`.
    pub fn describe(&self) -> String {
        match self.key() {
            Some(key) => format!("{} '{key}'", self.kind()),
            None => self.kind().to_string(),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// What a policy document represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    #[default]
    Set,
    Offer,
    Contract,
}

/// Root aggregate of the model. Built once with [`PolicyBuilder`], then read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(default, rename = "type")]
    policy_type: PolicyType,
    #[serde(default)]
    permissions: Vec<Permission>,
    #[serde(default)]
    prohibitions: Vec<Prohibition>,
    #[serde(default)]
    obligations: Vec<Duty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inherits_from: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extensible_properties: BTreeMap<String, Value>,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// Starts a builder pre-populated with this policy's contents.
    pub fn to_builder(&self) -> PolicyBuilder {
        PolicyBuilder {
            policy: self.clone(),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn prohibitions(&self) -> &[Prohibition] {
        &self.prohibitions
    }

    pub fn obligations(&self) -> &[Duty] {
        &self.obligations
    }

    pub fn assigner(&self) -> Option<&str> {
        self.assigner.as_deref()
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn inherits_from(&self) -> Option<&str> {
        self.inherits_from.as_deref()
    }

    pub fn extensible_properties(&self) -> &BTreeMap<String, Value> {
        &self.extensible_properties
    }

    /// True if the policy has no permissions, prohibitions or obligations.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.prohibitions.is_empty() && self.obligations.is_empty()
    }

    /// Every top-level rule in declaration order: permissions, prohibitions, obligations.
    pub fn rules(&self) -> impl Iterator<Item = Rule<'_>> {
        self.permissions
            .iter()
            .map(Rule::Permission)
            .chain(self.prohibitions.iter().map(Rule::Prohibition))
            .chain(self.obligations.iter().map(Rule::Duty))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    policy: Policy,
}

impl PolicyBuilder {
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.policy.uid = Some(uid.into());
        self
    }

    pub fn policy_type(mut self, policy_type: PolicyType) -> Self {
        self.policy.policy_type = policy_type;
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.policy.permissions.push(permission);
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.policy.permissions.extend(permissions);
        self
    }

    pub fn prohibition(mut self, prohibition: Prohibition) -> Self {
        self.policy.prohibitions.push(prohibition);
        self
    }

    pub fn prohibitions(mut self, prohibitions: impl IntoIterator<Item = Prohibition>) -> Self {
        self.policy.prohibitions.extend(prohibitions);
        self
    }

    pub fn duty(mut self, duty: Duty) -> Self {
        self.policy.obligations.push(duty);
        self
    }

    pub fn duties(mut self, duties: impl IntoIterator<Item = Duty>) -> Self {
        self.policy.obligations.extend(duties);
        self
    }

    pub fn assigner(mut self, assigner: impl Into<String>) -> Self {
        self.policy.assigner = Some(assigner.into());
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.policy.assignee = Some(assignee.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.policy.target = Some(target.into());
        self
    }

    pub fn inherits_from(mut self, parent: impl Into<String>) -> Self {
        self.policy.inherits_from = Some(parent.into());
        self
    }

    pub fn extensible_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.policy
            .extensible_properties
            .insert(key.into(), value.into());
        self
    }

    pub(crate) fn clear_rules(mut self) -> Self {
        self.policy.permissions.clear();
        self.policy.prohibitions.clear();
        self.policy.obligations.clear();
        self
    }

    pub fn build(self) -> Policy {
        self.policy
    }
}

// ============================================================================
// Tests
// ============================================================================
