//! Evaluation context handed to every function during a policy evaluation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity key looked up by [`ParticipantAgent::identity`].
pub const IDENTITY_KEY: &str = "identity";

// ============================================================================
// Participant Agent
// ============================================================================

/// The party whose request is being evaluated.
///
/// Built upstream from verified tokens; functions only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantAgent {
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
    #[serde(default)]
    pub claims: BTreeMap<String, Value>,
}

impl ParticipantAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// The participant identifier, if one was recorded.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get(IDENTITY_KEY).map(String::as_str)
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity.insert(IDENTITY_KEY.to_string(), identity.into());
        self
    }

    pub fn with_identity_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.identity.insert(key.into(), value.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Policy Context
// ============================================================================

/// Per-evaluation state shared by validators and functions.
///
/// Functions may record problems with [`report_problem`](Self::report_problem);
/// any reported problem fails the evaluation even if every function returned true.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    agent: ParticipantAgent,
    evaluated_at: DateTime<Utc>,
    data: BTreeMap<String, Value>,
    problems: Vec<String>,
}

impl PolicyContext {
    /// Creates a context for `agent`, timestamped now.
    pub fn new(agent: ParticipantAgent) -> Self {
        Self {
            agent,
            evaluated_at: Utc::now(),
            data: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    /// Fixes the evaluation time (time-based functions read it).
    pub fn with_timestamp(mut self, evaluated_at: DateTime<Utc>) -> Self {
        self.evaluated_at = evaluated_at;
        self
    }

    /// Attaches caller data, e.g. the asset being negotiated.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn agent(&self) -> &ParticipantAgent {
        &self.agent
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn put_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn report_problem(&mut self, problem: impl Into<String>) {
        self.problems.push(problem.into());
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    pub(crate) fn take_problems(&mut self) -> Vec<String> {
        std::mem::take(&mut self.problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_agent_identity_and_claims() {
        let agent = ParticipantAgent::new()
            .with_identity("did:web:provider")
            .with_identity_attribute("issuer", "did:web:authority")
            .with_claim("region", "eu")
            .with_claim("tier", 3);

        assert_eq!(agent.identity(), Some("did:web:provider"));
        assert_eq!(agent.claim("region"), Some(&json!("eu")));
        assert_eq!(agent.claim("tier"), Some(&json!(3)));
        assert_eq!(agent.claim("missing"), None);
    }

    #[test]
    fn test_agent_without_identity() {
        let agent = ParticipantAgent::new();
        assert_eq!(agent.identity(), None);
    }

    #[test]
    fn test_context_problems() {
        let mut context = PolicyContext::new(ParticipantAgent::new());
        assert!(!context.has_problems());

        context.report_problem("claim 'region' missing");
        assert!(context.has_problems());
        assert_eq!(context.problems(), ["claim 'region' missing".to_string()]);

        let taken = context.take_problems();
        assert_eq!(taken.len(), 1);
        assert!(!context.has_problems());
    }

    #[test]
    fn test_context_timestamp_and_data() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        let mut context = PolicyContext::new(ParticipantAgent::new())
            .with_timestamp(ts)
            .with_data("asset", "asset-1");
        context.put_data("agreement", json!({ "id": "a-1" }));

        assert_eq!(context.evaluated_at(), ts);
        assert_eq!(context.data("asset"), Some(&json!("asset-1")));
        assert_eq!(context.data("agreement"), Some(&json!({ "id": "a-1" })));
    }

    #[test]
    fn test_agent_json_roundtrip_shape() {
        let agent: ParticipantAgent = serde_json::from_value(json!({
            "identity": { "identity": "did:web:consumer" },
            "claims": { "region": "eu" }
        }))
        .expect("deserialize agent");

        assert_eq!(agent.identity(), Some("did:web:consumer"));
        assert_eq!(agent.claim("region"), Some(&json!("eu")));
    }
}
