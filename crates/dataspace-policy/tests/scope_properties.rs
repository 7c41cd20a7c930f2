//! Property tests for scope matching, binding and filtering.

use dataspace_policy::scope::matches;
use dataspace_policy::{
    ALL_SCOPES, Action, Constraint, Operator, Permission, Policy, PolicyEngine, Prohibition,
    RuleBindingRegistry, Scope, ScopeFilter,
};
use proptest::prelude::*;
use test_case::test_case;

fn scope_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z-]{0,7}", 1..4)
}

fn join(segments: &[String]) -> String {
    segments.join(".")
}

// ============================================================================
// Scope Matching
// ============================================================================

#[test_case("catalog", "catalog", true ; "equal")]
#[test_case("catalog", "catalog.offer", true ; "child")]
#[test_case("catalog", "catalog.offer.filter", true ; "grandchild")]
#[test_case("catalog.offer", "catalog", false ; "parent")]
#[test_case("catalog", "catalogue", false ; "string prefix")]
#[test_case("catalog", "transfer", false ; "sibling")]
#[test_case("*", "transfer.provision", true ; "wildcard")]
fn scope_matching(registered: &str, evaluated: &str, expected: bool) {
    assert_eq!(matches(registered, evaluated), expected);
}

proptest! {
    /// Property: A scope matches itself and every descendant
    #[test]
    fn prop_scope_matches_descendants(
        base in scope_strategy(),
        extra in prop::collection::vec("[a-z]{1,6}", 0..3),
    ) {
        let registered = join(&base);
        let mut segments = base.clone();
        segments.extend(extra);
        let evaluated = join(&segments);

        prop_assert!(matches(&registered, &evaluated));
        prop_assert!(Scope::new(registered).contains(&evaluated));
    }

    /// Property: A strict descendant never matches its ancestor
    #[test]
    fn prop_scope_never_matches_upward(
        base in scope_strategy(),
        extra in prop::collection::vec("[a-z]{1,6}", 1..3),
    ) {
        let ancestor = join(&base);
        let mut segments = base.clone();
        segments.extend(extra);
        let descendant = join(&segments);

        prop_assert!(!matches(&descendant, &ancestor));
    }

    /// Property: Extending the last segment never produces a match
    #[test]
    fn prop_partial_segment_never_matches(
        base in scope_strategy(),
        suffix in "[a-z]{1,4}",
    ) {
        let registered = join(&base);
        let evaluated = format!("{registered}{suffix}");

        prop_assert!(!matches(&registered, &evaluated));
    }

    /// Property: The wildcard matches every scope
    #[test]
    fn prop_all_scopes_matches_everything(scope in scope_strategy()) {
        prop_assert!(matches(ALL_SCOPES, &join(&scope)));
    }

    /// Property: Binding twice is observably the same as binding once
    #[test]
    fn prop_bind_idempotent(
        key in "[a-z]{1,8}",
        bound in scope_strategy(),
        probe in scope_strategy(),
    ) {
        let bound = join(&bound);
        let probe = join(&probe);

        let once = RuleBindingRegistry::new().with_binding(key.clone(), bound.clone());
        let twice = RuleBindingRegistry::new()
            .with_binding(key.clone(), bound.clone())
            .with_binding(key.clone(), bound);

        prop_assert_eq!(once.is_in_scope(&key, &probe), twice.is_in_scope(&key, &probe));
        prop_assert_eq!(once.scopes_for(&key), twice.scopes_for(&key));
    }

    /// Property: Filtering an already filtered policy changes nothing
    #[test]
    fn prop_filter_idempotent(scope in scope_strategy(), bound in scope_strategy()) {
        let scope = join(&scope);
        let bindings = RuleBindingRegistry::new()
            .with_binding("use", bound.clone().join("."))
            .with_binding("region", ALL_SCOPES)
            .with_binding("share", bound.join("."));

        let policy = Policy::builder()
            .permission(
                Permission::new(Action::new("use")).with_constraint(Constraint::and(vec![
                    Constraint::atomic("region", Operator::Eq, "eu"),
                    Constraint::atomic("purpose", Operator::Eq, "research"),
                ])),
            )
            .prohibition(Prohibition::new(Action::new("share")))
            .build();

        let filter = ScopeFilter::new(&bindings);
        let once = filter.filter(&policy, &scope);
        let twice = filter.filter(&once, &scope);

        prop_assert_eq!(once, twice);
    }

    /// Property: An empty policy is permitted in every scope
    #[test]
    fn prop_empty_policy_permitted(scope in scope_strategy()) {
        let engine = PolicyEngine::default().without_audit();
        let policy = Policy::builder().build();

        prop_assert!(engine.evaluate(&join(&scope), &policy, &Default::default()).is_ok());
    }
}
