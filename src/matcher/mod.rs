//! Name matching for the common case
//!
//! [`NameMatcher`] tests one name at a time without building an automaton.
//! It accepts the same pattern syntax as [`crate::automaton`]:
//!
//! - `logs` - exact name
//! - `logs-*` - prefix
//! - `metrics-*-prod`, `a?c` - wildcards
//! - `/logs-[0-9]+/` - full-match regular expression
//!
//! Matchers compose with [`NameMatcher::and`], [`NameMatcher::or`] and
//! [`NameMatcher::not`]; composition shares the underlying pattern sets.

mod name_matcher;

pub use name_matcher::NameMatcher;
