//! Error types for policy evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::RuleKind;

/// Which phase of the evaluation produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PreValidation,
    PermissionNotGranted,
    ProhibitionTriggered,
    DutyUnsatisfied,
    PostValidation,
    /// Raised by a function through `PolicyContext::report_problem`.
    Reported,
}

/// One reason a policy was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Error type for policy evaluation and validation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy was evaluated and denied.
    #[error("Policy denied in scope '{scope}': {}", join(.failures))]
    Denied {
        scope: String,
        failures: Vec<Failure>,
    },

    /// An in-scope constraint has no function to evaluate it.
    ///
    /// This is a configuration error, not a business decision: a
    /// registration call is missing for this key and scope.
    #[error("No function found for {kind} constraint key '{key}' in scope '{scope}'")]
    MissingFunction {
        scope: String,
        kind: RuleKind,
        key: String,
    },

    /// Static validation found keys the engine cannot evaluate.
    #[error("Policy is invalid: {}", .issues.join("; "))]
    Invalid { issues: Vec<String> },
}

impl PolicyError {
    /// True for misconfiguration as opposed to a legitimate denial.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::MissingFunction { .. })
    }

    /// The evaluation failures, empty for non-denial errors.
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::Denied { failures, .. } => failures,
            _ => &[],
        }
    }
}

fn join(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
