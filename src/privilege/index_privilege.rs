//! Index privileges: a named set of action patterns plus the selectors they cover

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::automaton::{self, Automaton};
use crate::core::AuthzResult;
use crate::matcher::NameMatcher;

use super::selector::{Selector, SelectorPredicate};

/// Name of the maximal privilege
pub const ALL: &str = "all";

/// A compiled index privilege.
///
/// Built once by the [`PrivilegeRegistry`](super::PrivilegeRegistry) and
/// shared by reference between groups.
pub struct IndexPrivilege {
    names: BTreeSet<String>,
    patterns: Vec<String>,
    action_matcher: NameMatcher,
    automaton: Arc<Automaton>,
    selector_predicate: SelectorPredicate,
}

impl IndexPrivilege {
    pub(crate) fn new(
        names: BTreeSet<String>,
        patterns: Vec<String>,
        selector_predicate: SelectorPredicate,
    ) -> AuthzResult<Self> {
        let action_matcher = NameMatcher::of(&patterns)?;
        let automaton = Arc::new(automaton::patterns(&patterns)?);
        Ok(Self {
            names,
            patterns,
            action_matcher,
            automaton,
            selector_predicate,
        })
    }

    /// Privilege names this privilege was resolved from
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Action patterns granted by this privilege
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `action` is granted
    pub fn check_action(&self, action: &str) -> bool {
        self.action_matcher.test(action)
    }

    /// Automaton over granted action names
    pub fn automaton(&self) -> &Arc<Automaton> {
        &self.automaton
    }

    pub fn selector_predicate(&self) -> SelectorPredicate {
        self.selector_predicate
    }

    /// Whether this privilege applies to `selector`
    pub fn check_selector(&self, selector: Selector) -> bool {
        self.selector_predicate.test(selector)
    }

    /// Whether this is exactly the maximal `all` privilege
    pub fn is_all(&self) -> bool {
        self.names.len() == 1 && self.names.contains(ALL)
    }
}

impl fmt::Debug for IndexPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexPrivilege")
            .field("names", &self.names)
            .field("selector_predicate", &self.selector_predicate)
            .finish()
    }
}

impl fmt::Display for IndexPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        f.write_str(&names.join(","))
    }
}
