//! Configuration commands.

use std::path::Path;

use anyhow::{Context, Result};
use dataspace_policy_config::{Paths, PolicyConfig};

use crate::style::{SemanticStyle, print_hint};

/// Show the effective configuration.
pub fn show(project: &Path) -> Result<()> {
    if !Paths::is_initialized(project) {
        print_hint(&format!(
            "No dataspace-policy.toml in {}, showing defaults and overrides",
            project.display()
        ));
    }

    let config = PolicyConfig::load_from_dir(project).context("Failed to load configuration")?;
    let rendered = config.to_toml().context("Failed to render configuration")?;

    println!("{}", "# effective configuration".muted());
    println!("{rendered}");
    Ok(())
}
