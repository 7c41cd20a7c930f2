//! CLI argument parsing and command tests.
//!
//! Each test writes its policy, agent and configuration files into a
//! temporary project directory.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
[engine]
audit = false

[[bindings]]
key = "use"
scopes = ["*"]

[[bindings]]
key = "distribute"
scopes = ["transfer"]

[[claims]]
key = "region"
claim = "region"
scopes = ["catalog"]

[evaluation_time]
scopes = ["contract"]
"#;

const POLICY: &str = r#"{
  "uid": "policy-1",
  "permissions": [
    {
      "action": { "type": "use" },
      "constraints": [
        { "type": "atomic", "left": "region", "operator": "eq", "right": "eu" }
      ]
    }
  ]
}"#;

const DEADLINE_POLICY: &str = r#"{
  "permissions": [
    {
      "action": { "type": "use" },
      "constraints": [
        { "type": "atomic", "left": "evaluation_time", "operator": "lt", "right": "2030-01-01T00:00:00Z" }
      ]
    }
  ]
}"#;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("dataspace-policy.toml"), CONFIG).unwrap();
    fs::write(temp.path().join("policy.json"), POLICY).unwrap();
    fs::write(temp.path().join("deadline.json"), DEADLINE_POLICY).unwrap();
    fs::write(
        temp.path().join("eu.json"),
        r#"{ "identity": { "identity": "did:web:eu" }, "claims": { "region": "eu" } }"#,
    )
    .unwrap();
    fs::write(
        temp.path().join("us.json"),
        r#"{ "claims": { "region": "us" } }"#,
    )
    .unwrap();
    temp
}

fn dspolicy(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dspolicy").unwrap();
    cmd.current_dir(project).arg("--no-color");
    cmd
}

// ============================================================================
// Basic Commands
// ============================================================================

#[test]
fn version_command_succeeds() {
    Command::cargo_bin("dspolicy")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dspolicy"));
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("dspolicy")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dspolicy"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("dspolicy")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("evaluate"));
}

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("dspolicy")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// Argument Parsing Errors
// ============================================================================

#[test]
fn evaluate_requires_scope() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "policy.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--scope"));
}

#[test]
fn scope_requires_key_and_scope() {
    let temp = project();
    dspolicy(temp.path())
        .args(["scope", "use"])
        .assert()
        .failure();
}

#[test]
fn evaluate_rejects_malformed_time() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "policy.json", "--scope", "catalog", "--at", "tomorrow"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn evaluate_missing_policy_file_fails() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "absent.json", "--scope", "catalog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read policy"));
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn evaluate_permits_matching_claim() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "policy.json", "--scope", "catalog", "--agent", "eu.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy permitted"))
        .stdout(predicate::str::contains("did:web:eu"));
}

#[test]
fn evaluate_denies_other_claim() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "policy.json", "--scope", "catalog", "--agent", "us.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Policy denied"));
}

#[test]
fn evaluate_out_of_scope_constraint_is_ignored() {
    let temp = project();
    dspolicy(temp.path())
        .args(["evaluate", "policy.json", "--scope", "transfer", "--agent", "us.json"])
        .assert()
        .success();
}

#[test]
fn evaluate_uses_evaluation_time() {
    let temp = project();
    dspolicy(temp.path())
        .args([
            "evaluate",
            "deadline.json",
            "--scope",
            "contract.negotiation",
            "--at",
            "2029-06-01T00:00:00Z",
        ])
        .assert()
        .success();

    dspolicy(temp.path())
        .args([
            "evaluate",
            "deadline.json",
            "--scope",
            "contract.negotiation",
            "--at",
            "2031-06-01T00:00:00Z",
        ])
        .assert()
        .failure();
}

#[test]
fn evaluate_with_explicit_config_file() {
    let temp = project();
    let config = temp.path().join("other.toml");
    fs::write(&config, "[[bindings]]\nkey = \"use\"\nscopes = [\"transfer\"]\n").unwrap();

    // Only "use" is bound, so the region constraint is filtered out
    dspolicy(temp.path())
        .args(["evaluate", "policy.json", "--scope", "transfer", "--agent", "us.json"])
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
}

// ============================================================================
// Scope & Validation
// ============================================================================

#[test]
fn scope_reports_inherited_binding() {
    let temp = project();
    dspolicy(temp.path())
        .args(["scope", "distribute", "transfer.provision"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is evaluated in scope"))
        .stdout(predicate::str::contains("transfer"));
}

#[test]
fn scope_reports_sibling_as_out_of_scope() {
    let temp = project();
    dspolicy(temp.path())
        .args(["scope", "distribute", "catalog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is not evaluated"));
}

#[test]
fn validate_accepts_wired_policy() {
    let temp = project();
    dspolicy(temp.path())
        .args(["validate", "policy.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rule(s)"));
}

#[test]
fn validate_reports_unhandled_key() {
    let temp = project();
    fs::write(
        temp.path().join("purpose.json"),
        r#"{ "prohibitions": [ { "action": { "type": "use" }, "constraints": [
            { "type": "atomic", "left": "purpose", "operator": "eq", "right": "ads" } ] } ] }"#,
    )
    .unwrap();

    dspolicy(temp.path())
        .args(["validate", "purpose.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("constraint key 'purpose'"));
}

#[test]
fn config_shows_effective_bindings() {
    let temp = project();
    dspolicy(temp.path())
        .args(["config", "--project"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("distribute"));
}
