//! Scope binding inspection command.

use std::path::Path;

use anyhow::Result;
use dataspace_policy::{Action, Permission, Policy};

use super::load_config;
use crate::style::{SemanticStyle, print_hint, print_labeled, print_success, print_warn};

pub fn run(key: &str, scope: &str, project: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(project, config)?;
    let engine = config.build_engine();

    // A single-rule policy survives filtering exactly when its key is in scope
    let probe = Policy::builder()
        .permission(Permission::new(Action::new(key)))
        .build();
    let evaluated = !engine.filter(&probe, scope).is_empty();

    if evaluated {
        print_success(&format!("{} is evaluated in scope {}", key.code(), scope.code()));
    } else {
        print_warn(&format!("{} is not evaluated in scope {}", key.code(), scope.code()));
    }

    let scopes = engine.bindings().scopes_for(key);
    if scopes.is_empty() {
        print_hint(&format!(
            "{key} has no bindings (unbound keys: {:?})",
            engine.settings().unbound_keys
        ));
    } else {
        let listed: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        print_labeled("Bound to", &listed.join(", "));
    }

    Ok(())
}
