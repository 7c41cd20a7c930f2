//! Policy validation command.

use std::path::Path;

use anyhow::{Result, bail};
use dataspace_policy::PolicyError;

use super::{load_config, read_policy};
use crate::style::{print_error, print_success};

pub fn run(policy_path: &Path, project: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(project, config)?;
    let engine = config.build_engine();
    let policy = read_policy(policy_path)?;

    match engine.validate(&policy) {
        Ok(()) => {
            print_success(&format!(
                "{} rule(s) bound and handled",
                policy.rules().count()
            ));
            Ok(())
        }
        Err(PolicyError::Invalid { issues }) => {
            for issue in &issues {
                print_error(issue);
            }
            bail!("{} issue(s) found", issues.len())
        }
        Err(err) => Err(err.into()),
    }
}
