//! Kani proofs for scope matching and logical combination
//!
//! These proofs verify the properties the scope filter relies on using
//! bounded model checking.
//!
//! **Proof Count**: 4 proofs
//!
//! Run with: `cargo kani --tests --harness verify_*`

#[cfg(kani)]
use crate::model::LogicalOperator;
#[cfg(kani)]
use crate::scope::{ALL_SCOPES, matches};

#[cfg(kani)]
const SEGMENTS: [&str; 3] = ["catalog", "offer", "filter"];

#[cfg(kani)]
fn any_scope(depth: usize) -> String {
    SEGMENTS[..depth].join(".")
}

/// Proof #1: Scope matching is reflexive
///
/// **Property**: Every scope matches itself
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_scope_match_reflexive() {
    let depth: usize = kani::any();
    kani::assume(depth >= 1 && depth <= SEGMENTS.len());

    let scope = any_scope(depth);
    assert!(matches(&scope, &scope));
}

/// Proof #2: Scope matching flows downward only
///
/// **Property**: An ancestor matches its descendants; a strict descendant
/// never matches its ancestor
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_scope_match_downward_only() {
    let ancestor: usize = kani::any();
    let descendant: usize = kani::any();
    kani::assume(ancestor >= 1 && ancestor < descendant && descendant <= SEGMENTS.len());

    let upper = any_scope(ancestor);
    let lower = any_scope(descendant);

    assert!(matches(&upper, &lower));
    assert!(!matches(&lower, &upper));
}

/// Proof #3: The wildcard matches every scope
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_all_scopes_matches_everything() {
    let depth: usize = kani::any();
    kani::assume(depth <= SEGMENTS.len());

    assert!(matches(ALL_SCOPES, &any_scope(depth)));
}

/// Proof #4: Xone holds iff exactly one child holds
#[cfg(kani)]
#[kani::proof]
fn verify_xone_exactly_one() {
    let a: bool = kani::any();
    let b: bool = kani::any();
    let c: bool = kani::any();

    let holds = LogicalOperator::Xone.combine(&[a, b, c]);
    let count = u8::from(a) + u8::from(b) + u8::from(c);

    assert_eq!(holds, count == 1);
    assert_eq!(LogicalOperator::And.combine(&[a, b, c]), a && b && c);
    assert_eq!(LogicalOperator::Or.combine(&[a, b, c]), a || b || c);
}
