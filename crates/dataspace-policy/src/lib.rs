//! # dataspace-policy: Scope-Aware Policy Evaluation
//!
//! Decides whether a participant may perform an operation under an ODRL-style
//! usage policy. The same policy is evaluated differently depending on the
//! *scope* (catalog request, contract negotiation, transfer) it is evaluated in.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Bootstrap                                   │
//! │  ├─ RuleBindingRegistry: key → scopes        │
//! │  └─ FunctionRegistry: scoped functions       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicyEngine::evaluate(scope, policy, agent)│
//! │  ├─ Pre-validators (fail fast)               │
//! │  ├─ Scope filter                             │
//! │  ├─ Permissions / prohibitions / duties      │
//! │  └─ Post-validators                          │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Ok(()) or PolicyError                       │
//! │  - Denied: every failure, in order           │
//! │  - MissingFunction: misconfiguration         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Scopes
//!
//! Scopes are dot-delimited (`catalog.contract-offer`). A binding or function
//! registered for a scope applies to it and to every scope below it;
//! [`ALL_SCOPES`] applies everywhere. A rule or constraint whose key is not
//! bound to the evaluation scope is dropped before evaluation.
//!
//! ## Examples
//!
//! ```
//! use dataspace_policy::{
//!     Action, Constraint, FunctionRegistry, Operator, ParticipantAgent, Permission, Policy,
//!     PolicyEngine, RuleBindingRegistry, RuleKind,
//! };
//! use serde_json::Value;
//!
//! let bindings = RuleBindingRegistry::new()
//!     .with_binding("use", "catalog")
//!     .with_binding("region", "catalog");
//!
//! let mut functions = FunctionRegistry::new();
//! functions.register_constraint_function(
//!     "catalog",
//!     RuleKind::Permission,
//!     "region",
//!     |operator, right, _rule, context| {
//!         let region = context.agent().claim("region").cloned().unwrap_or(Value::Null);
//!         operator.apply(&region, right)
//!     },
//! );
//!
//! let engine = PolicyEngine::new(bindings, functions);
//! let policy = Policy::builder()
//!     .permission(
//!         Permission::new(Action::new("use"))
//!             .with_constraint(Constraint::atomic("region", Operator::Eq, "eu")),
//!     )
//!     .build();
//!
//! let eu = ParticipantAgent::new().with_claim("region", "eu");
//! let us = ParticipantAgent::new().with_claim("region", "us");
//!
//! assert!(engine.evaluate("catalog", &policy, &eu).is_ok());
//! assert!(engine.evaluate("catalog", &policy, &us).is_err());
//! // Nothing is bound to transfer, so the permission is filtered out
//! assert!(engine.evaluate("transfer", &policy, &us).is_ok());
//! ```

pub mod binding;
pub mod builtin;
pub mod context;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod scope;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;


pub use binding::RuleBindingRegistry;
pub use builtin::{ClaimConstraintFunction, EVALUATION_TIME_KEY, evaluation_time};
pub use context::{ParticipantAgent, PolicyContext};
pub use engine::{EngineSettings, PolicyEngine};
pub use error::{Failure, FailureKind, PolicyError, Result};
pub use model::{
    Action, AtomicConstraint, Constraint, Duty, LiteralExpression, LogicalConstraint,
    LogicalOperator, Operator, Permission, Policy, PolicyBuilder, PolicyType, Prohibition, Rule,
    RuleKind,
};
pub use registry::{DynamicConstraintFunction, FunctionRegistry};
pub use scope::{ALL_SCOPES, Scope, ScopeFilter, UnboundKeys};
