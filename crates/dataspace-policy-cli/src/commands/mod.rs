//! CLI command implementations.

pub mod config;
pub mod evaluate;
pub mod scope;
pub mod validate;
pub mod version;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dataspace_policy::Policy;
use dataspace_policy_config::PolicyConfig;
use tracing::debug;

/// Loads an explicit config file, or the layered configuration of `project`.
pub(crate) fn load_config(project: &Path, config: Option<&Path>) -> Result<PolicyConfig> {
    debug!(project = %project.display(), config = ?config, "Loading configuration");
    match config {
        Some(path) => PolicyConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => PolicyConfig::load_from_dir(project).context("Failed to load configuration"),
    }
}

/// Reads a policy JSON document.
pub(crate) fn read_policy(path: &Path) -> Result<Policy> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse policy {}", path.display()))
}
