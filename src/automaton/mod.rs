//! Pattern algebra over resource and action names
//!
//! Name patterns compile into minimal DFAs which support union, intersection,
//! difference and subset tests. Results are always minimized and canonical, so
//! equal languages compare equal and can be used as map keys.
//!
//! Pattern syntax:
//! - `/regex/` - a full-match regular expression
//! - `logs-*`, `metrics-?` - wildcards (`*` any string, `?` any one character)
//! - anything else - a literal name
//!
//! ## Example
//!
//! ```rust
//! use shadow_authz::automaton;
//!
//! let logs = automaton::patterns(["logs-*"]).unwrap();
//! let one = automaton::patterns(["logs-2024"]).unwrap();
//! assert!(one.subset_of(&logs));
//! assert!(!logs.subset_of(&one));
//! ```
//!
//! Construction fails with [`AuthzError::TooComplex`] when determinization
//! would need more than [`max_determinized_states`] states.

mod dfa;
mod nfa;

use std::sync::atomic::{AtomicUsize, Ordering};

pub use dfa::Automaton;

use crate::core::{AuthzError, AuthzResult};
use nfa::Nfa;

/// Default bound on the number of states of a single automaton
pub const DEFAULT_MAX_DETERMINIZED_STATES: usize = 100_000;

static MAX_DETERMINIZED_STATES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_DETERMINIZED_STATES);

/// Current bound on automaton size
pub fn max_determinized_states() -> usize {
    MAX_DETERMINIZED_STATES.load(Ordering::Relaxed)
}

/// Change the bound on automaton size.
///
/// Applies to automata built after the call; cached automata are kept.
pub fn set_max_determinized_states(limit: usize) -> AuthzResult<()> {
    if limit < 2 {
        return Err(AuthzError::InvalidConfig(format!(
            "max_determinized_states must be at least 2, got {}",
            limit
        )));
    }
    tracing::debug!("Setting automaton state limit to {}", limit);
    MAX_DETERMINIZED_STATES.store(limit, Ordering::Relaxed);
    Ok(())
}

/// Compile the union of `patterns`. No patterns yields the empty automaton.
pub fn patterns<I, S>(patterns: I) -> AuthzResult<Automaton>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut nfa = Nfa::new(max_determinized_states());
    let mut any = false;
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern == "*" {
            return Ok(Automaton::total());
        }
        nfa.add_pattern(pattern)?;
        any = true;
    }
    if !any {
        return Ok(Automaton::empty());
    }
    nfa.determinize()
}

/// Compile a single pattern
pub fn pattern(pattern: &str) -> AuthzResult<Automaton> {
    patterns([pattern])
}

/// Union of any number of automata
pub fn union_all<'a, I>(automata: I) -> AuthzResult<Automaton>
where
    I: IntoIterator<Item = &'a Automaton>,
{
    let mut iter = automata.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Automaton::empty());
    };
    let mut acc = first.clone();
    for next in iter {
        if acc.is_total() {
            break;
        }
        acc = acc.union(next)?;
    }
    Ok(acc)
}

/// Whether the pattern uses the `/regex/` syntax
pub fn is_lucene_regex(pattern: &str) -> bool {
    pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/')
}

/// Whether the pattern is a `*` wildcard pattern
pub fn is_simple_match_pattern(pattern: &str) -> bool {
    pattern.contains('*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn star_is_total() {
        assert!(pattern("*").unwrap().is_total());
        assert!(patterns(["a", "*"]).unwrap().is_total());
    }

    #[test]
    fn same_language_same_automaton() {
        let a = patterns(["logs-*", "logs-2024"]).unwrap();
        let b = patterns(["logs-*"]).unwrap();
        assert_eq!(a, b);

        let c = patterns(["/logs-.*/"]).unwrap();
        assert_eq!(b, c);
    }

    #[test]
    fn regex_detection() {
        assert!(is_lucene_regex("/a.*/"));
        assert!(!is_lucene_regex("/"));
        assert!(!is_lucene_regex("a*"));
        assert!(is_simple_match_pattern("a*"));
        assert!(!is_simple_match_pattern("/a.b/"));
    }

    #[test]
    fn union_all_of_nothing_is_empty() {
        assert!(union_all(std::iter::empty()).unwrap().is_empty());
        let a = pattern("a").unwrap();
        let b = pattern("b").unwrap();
        let ab = union_all([&a, &b]).unwrap();
        assert_eq!(ab, patterns(["a", "b"]).unwrap());
    }

    #[test]
    fn rejects_tiny_limit() {
        assert!(set_max_determinized_states(1).is_err());
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-c\\-]{0,6}"
    }

    fn wildcard() -> impl Strategy<Value = String> {
        "[a-c\\-*?]{0,5}"
    }

    proptest! {
        #[test]
        fn operations_agree_with_membership(p in wildcard(), q in wildcard(), n in name()) {
            let a = pattern(&p).unwrap();
            let b = pattern(&q).unwrap();
            prop_assert_eq!(a.union(&b).unwrap().run(&n), a.run(&n) || b.run(&n));
            prop_assert_eq!(a.intersection(&b).unwrap().run(&n), a.run(&n) && b.run(&n));
            prop_assert_eq!(a.minus(&b).unwrap().run(&n), a.run(&n) && !b.run(&n));
        }

        #[test]
        fn subset_agrees_with_minus(p in wildcard(), q in wildcard()) {
            let a = pattern(&p).unwrap();
            let b = pattern(&q).unwrap();
            prop_assert_eq!(a.subset_of(&b), a.minus(&b).unwrap().is_empty());
        }

        #[test]
        fn union_is_commutative(p in wildcard(), q in wildcard()) {
            let a = pattern(&p).unwrap();
            let b = pattern(&q).unwrap();
            prop_assert_eq!(a.union(&b).unwrap(), b.union(&a).unwrap());
        }
    }
}
