//! Dataspace policy CLI.
//!
//! Evaluates usage policies against a participant in a scope, using the
//! bindings and functions wired by the project's `dataspace-policy.toml`.
//!
//! # Quick Start
//!
//! ```bash
//! # Is the "use" action evaluated when serving the catalog?
//! dspolicy scope use catalog
//!
//! # Evaluate a policy for a participant
//! dspolicy evaluate policy.json --scope catalog --agent agent.json
//!
//! # Check that every key in a policy is bound and handled
//! dspolicy validate policy.json
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// dspolicy - scope-aware usage policy evaluation for dataspace connectors.
#[derive(Parser)]
#[command(name = "dspolicy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Show engine decisions and filtered rules.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Evaluate a policy document in a scope.
    Evaluate {
        /// Path to the policy JSON document.
        policy: PathBuf,

        /// Evaluation scope, e.g. catalog or transfer.provision.
        #[arg(short, long)]
        scope: String,

        /// Path to a participant agent JSON document (identity and claims).
        #[arg(short, long)]
        agent: Option<PathBuf>,

        /// Evaluation time as RFC 3339 (defaults to now).
        #[arg(long)]
        at: Option<String>,

        /// Project directory holding dataspace-policy.toml.
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Use a single configuration file instead of the layered sources.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check whether a rule key is evaluated in a scope.
    Scope {
        /// Action type or constraint left operand.
        key: String,

        /// Evaluation scope.
        scope: String,

        /// Project directory holding dataspace-policy.toml.
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Use a single configuration file instead of the layered sources.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that every key in a policy is bound and has a function.
    Validate {
        /// Path to the policy JSON document.
        policy: PathBuf,

        /// Project directory holding dataspace-policy.toml.
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Use a single configuration file instead of the layered sources.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the effective configuration as TOML.
    Config {
        /// Project directory holding dataspace-policy.toml.
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    style::set_no_color(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Evaluate {
            policy,
            scope,
            agent,
            at,
            project,
            config,
        } => commands::evaluate::run(
            &policy,
            &scope,
            agent.as_deref(),
            at.as_deref(),
            &project,
            config.as_deref(),
        ),
        Commands::Scope {
            key,
            scope,
            project,
            config,
        } => commands::scope::run(&key, &scope, &project, config.as_deref()),
        Commands::Validate {
            policy,
            project,
            config,
        } => commands::validate::run(&policy, &project, config.as_deref()),
        Commands::Config { project } => commands::config::show(&project),
    }
}
