//! Policy evaluation command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use dataspace_policy::{FailureKind, ParticipantAgent, PolicyContext, PolicyError};

use super::{load_config, read_policy};
use crate::style::{SemanticStyle, print_error, print_hint, print_labeled, print_success};

pub fn run(
    policy_path: &Path,
    scope: &str,
    agent_path: Option<&Path>,
    at: Option<&str>,
    project: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(project, config)?;
    let engine = config.build_engine();
    let policy = read_policy(policy_path)?;

    let agent = match agent_path {
        Some(path) => read_agent(path)?,
        None => ParticipantAgent::new(),
    };

    let mut context = PolicyContext::new(agent);
    if let Some(at) = at {
        let evaluated_at = DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("Invalid evaluation time '{at}', expected RFC 3339"))?
            .with_timezone(&Utc);
        context = context.with_timestamp(evaluated_at);
    }

    match engine.evaluate_with_context(scope, &policy, &mut context) {
        Ok(()) => {
            print_success(&format!("Policy permitted in scope {}", scope.code()));
            print_labeled("Policy", policy.uid().unwrap_or("(no uid)"));
            print_labeled(
                "Participant",
                context.agent().identity().unwrap_or("(anonymous)"),
            );
            print_labeled("Evaluated at", &context.evaluated_at().to_rfc3339());
            Ok(())
        }
        Err(PolicyError::Denied { failures, .. }) => {
            print_error(&format!("Policy denied in scope {}", scope.code()));
            for failure in &failures {
                print_labeled(kind_label(failure.kind), &failure.message);
            }
            bail!("{} failure(s)", failures.len())
        }
        Err(err @ PolicyError::MissingFunction { .. }) => {
            print_error(&err.to_string());
            print_hint("Configure a claim or evaluation_time entry for this key and scope");
            bail!("engine misconfigured")
        }
        Err(err) => Err(err.into()),
    }
}

fn read_agent(path: &Path) -> Result<ParticipantAgent> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse agent {}", path.display()))
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::PreValidation => "pre-validation",
        FailureKind::PermissionNotGranted => "permission",
        FailureKind::ProhibitionTriggered => "prohibition",
        FailureKind::DutyUnsatisfied => "duty",
        FailureKind::PostValidation => "post-validation",
        FailureKind::Reported => "problem",
    }
}
