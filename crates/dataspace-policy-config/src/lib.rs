//! Configuration management for the dataspace policy engine
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (DSP_* prefix, `__` between nested keys)
//! 2. dataspace-policy.local.toml (gitignored, local overrides)
//! 3. dataspace-policy.toml (git-tracked, project config)
//! 4. ~/.config/dataspace-policy/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! A configuration wires an engine at bootstrap: rule bindings, claim-backed
//! constraint functions and the evaluation-time function.
//!
//! ```toml
//! [engine]
//! unbound_keys = "exclude"
//! audit = true
//!
//! [[bindings]]
//! key = "use"
//! scopes = ["*"]
//!
//! [[claims]]
//! key = "region"
//! claim = "region"
//! scopes = ["catalog", "contract.negotiation"]
//!
//! [evaluation_time]
//! scopes = ["contract"]
//! ```

use std::fs;
use std::path::Path;

use anyhow::Result;
use dataspace_policy::{
    ClaimConstraintFunction, EVALUATION_TIME_KEY, EngineSettings, FunctionRegistry, PolicyEngine,
    RuleBindingRegistry, RuleKind, Scope, evaluation_time,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

const RULE_KINDS: [RuleKind; 3] = [RuleKind::Permission, RuleKind::Prohibition, RuleKind::Duty];

/// Main policy engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub engine: EngineSettings,
    pub bindings: Vec<BindingDefinition>,
    pub claims: Vec<ClaimDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_time: Option<EvaluationTimeDefinition>,
}

/// Binds a rule key (action type or left operand) to scopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDefinition {
    pub key: String,
    pub scopes: Vec<String>,
}

/// Evaluates constraints on `key` by comparing the participant claim `claim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDefinition {
    pub key: String,
    pub claim: String,
    pub scopes: Vec<String>,
}

/// Enables the evaluation-time constraint function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationTimeDefinition {
    #[serde(default = "default_evaluation_time_key")]
    pub key: String,
    pub scopes: Vec<String>,
}

fn default_evaluation_time_key() -> String {
    EVALUATION_TIME_KEY.to_string()
}

impl PolicyConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, bypassing the layered sources
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject empty keys, empty scope lists and malformed scopes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = self
            .bindings
            .iter()
            .map(|b| ("binding", b.key.as_str(), b.scopes.as_slice()))
            .chain(
                self.claims
                    .iter()
                    .map(|c| ("claim", c.key.as_str(), c.scopes.as_slice())),
            )
            .chain(
                self.evaluation_time
                    .iter()
                    .map(|e| ("evaluation_time", e.key.as_str(), e.scopes.as_slice())),
            );

        for (section, key, scopes) in entries {
            if key.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{section} entry has an empty key"
                )));
            }
            if scopes.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{section} '{key}' has no scopes"
                )));
            }
            if let Some(scope) = scopes.iter().find(|s| !Scope::new(s.as_str()).is_well_formed()) {
                return Err(ConfigError::ValidationError(format!(
                    "{section} '{key}' has malformed scope '{scope}'"
                )));
            }
        }

        if let Some(claim) = self.claims.iter().find(|c| c.claim.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "claim '{}' does not name a participant claim",
                claim.key
            )));
        }

        Ok(())
    }

    /// Bind every configured key to its scopes.
    ///
    /// Claim and evaluation-time keys are bound to the scopes they are
    /// registered for.
    pub fn apply_bindings(&self, registry: &mut RuleBindingRegistry) {
        for binding in &self.bindings {
            for scope in &binding.scopes {
                registry.bind(binding.key.as_str(), scope.as_str());
            }
        }
        for claim in &self.claims {
            for scope in &claim.scopes {
                registry.bind(claim.key.as_str(), scope.as_str());
            }
        }
        if let Some(definition) = &self.evaluation_time {
            for scope in &definition.scopes {
                registry.bind(definition.key.as_str(), scope.as_str());
            }
        }
    }

    /// Register claim and evaluation-time functions for every rule kind
    pub fn apply_functions(&self, functions: &mut FunctionRegistry) {
        for claim in &self.claims {
            for scope in &claim.scopes {
                for kind in RULE_KINDS {
                    functions.register_dynamic_function(
                        scope.as_str(),
                        kind,
                        ClaimConstraintFunction::new().with_claim(&claim.key, &claim.claim),
                    );
                }
            }
            debug!(key = %claim.key, claim = %claim.claim, "Claim function configured");
        }

        if let Some(definition) = &self.evaluation_time {
            for scope in &definition.scopes {
                for kind in RULE_KINDS {
                    functions.register_constraint_function(
                        scope.as_str(),
                        kind,
                        &definition.key,
                        evaluation_time,
                    );
                }
            }
        }
    }

    /// Build an engine wired from this configuration
    pub fn build_engine(&self) -> PolicyEngine {
        let mut bindings = RuleBindingRegistry::new();
        let mut functions = FunctionRegistry::new();
        self.apply_bindings(&mut bindings);
        self.apply_functions(&mut functions);
        PolicyEngine::new(bindings, functions).with_settings(self.engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspace_policy::{
        Action, Constraint, Operator, ParticipantAgent, Permission, Policy, UnboundKeys,
    };

    fn sample() -> PolicyConfig {
        PolicyConfig {
            bindings: vec![BindingDefinition {
                key: "use".to_string(),
                scopes: vec!["*".to_string()],
            }],
            claims: vec![ClaimDefinition {
                key: "region".to_string(),
                claim: "country".to_string(),
                scopes: vec!["catalog".to_string()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PolicyConfig::default();
        assert_eq!(config.engine.unbound_keys, UnboundKeys::Exclude);
        assert!(config.engine.audit);
        assert!(config.bindings.is_empty());
        assert!(config.evaluation_time.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_bindings() {
        let mut registry = RuleBindingRegistry::new();
        sample().apply_bindings(&mut registry);

        assert!(registry.is_in_scope("use", "transfer"));
        assert!(registry.is_in_scope("region", "catalog.offer"));
        assert!(!registry.is_in_scope("region", "transfer"));
    }

    #[test]
    fn test_build_engine_evaluates_claims() {
        let engine = sample().build_engine().without_audit();
        let policy = Policy::builder()
            .permission(
                Permission::new(Action::new("use"))
                    .with_constraint(Constraint::atomic("region", Operator::Eq, "de")),
            )
            .build();

        let german = ParticipantAgent::new().with_claim("country", "de");
        let french = ParticipantAgent::new().with_claim("country", "fr");

        assert!(engine.evaluate("catalog", &policy, &german).is_ok());
        assert!(engine.evaluate("catalog", &policy, &french).is_err());
        assert!(engine.evaluate("transfer", &policy, &french).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_scopes() {
        let mut config = sample();
        config.bindings[0].scopes.clear();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'use' has no scopes"));
    }

    #[test]
    fn test_validate_rejects_malformed_scope() {
        let mut config = sample();
        config.claims[0].scopes = vec!["catalog..offer".to_string()];

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("malformed scope")
        ));
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let mut config = sample();
        config.bindings[0].key = " ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PolicyConfig {
            evaluation_time: Some(EvaluationTimeDefinition {
                key: EVALUATION_TIME_KEY.to_string(),
                scopes: vec!["contract".to_string()],
            }),
            ..sample()
        };

        let rendered = config.to_toml().expect("render toml");
        let parsed: PolicyConfig = toml::from_str(&rendered).expect("parse toml");

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("policy.toml");
        fs::write(&path, "[[bindings]]\nkey = \"use\"\nscopes = [\"catalog\"]\n")
            .expect("Failed to write config");

        let config = PolicyConfig::from_file(&path).expect("Failed to load config");
        assert_eq!(config.bindings[0].key, "use");

        let missing = PolicyConfig::from_file(temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        fs::write(&path, "[[bindings]\n").expect("Failed to write config");
        assert!(matches!(
            PolicyConfig::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_evaluation_time_key_defaults() {
        let config: PolicyConfig = toml::from_str(
            r#"
[evaluation_time]
scopes = ["contract"]
"#,
        )
        .expect("parse toml");

        let definition = config.evaluation_time.expect("evaluation_time section");
        assert_eq!(definition.key, EVALUATION_TIME_KEY);
    }
}
