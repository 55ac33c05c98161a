//! A single grant of one privilege over a set of index patterns

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::automaton::{self, Automaton};
use crate::core::{AuthzError, AuthzResult};
use crate::matcher::NameMatcher;
use crate::privilege::{IndexPrivilege, Selector};

use super::document::DocumentQuery;
use super::field::FieldPermissions;
use super::restricted::RestrictedIndices;

/// One grant: a privilege over index patterns with optional field and
/// document restrictions.
///
/// Restricted indices are excluded from the patterns unless
/// `allow_restricted_indices` is set.
pub struct Group {
    privilege: Arc<IndexPrivilege>,
    patterns: Vec<String>,
    name_matcher: NameMatcher,
    field_permissions: FieldPermissions,
    query: Option<BTreeSet<DocumentQuery>>,
    allow_restricted_indices: bool,
    /// Subtracted from the index automaton when restricted indices are not allowed
    restricted_automaton: Option<Arc<Automaton>>,
    index_automaton: OnceCell<Automaton>,
}

impl Group {
    pub fn new<S: AsRef<str>>(
        privilege: Arc<IndexPrivilege>,
        field_permissions: FieldPermissions,
        query: Option<BTreeSet<DocumentQuery>>,
        allow_restricted_indices: bool,
        restricted: &RestrictedIndices,
        patterns: &[S],
    ) -> AuthzResult<Self> {
        if patterns.is_empty() {
            return Err(AuthzError::InvalidConfig(format!(
                "index group for privilege [{}] must name at least one index pattern",
                privilege
            )));
        }
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let matcher = NameMatcher::of(&patterns)?;
        let (name_matcher, restricted_automaton) = if allow_restricted_indices {
            (matcher, None)
        } else {
            (
                matcher.and_not(restricted.matcher()),
                Some(Arc::clone(restricted.automaton())),
            )
        };

        Ok(Self {
            privilege,
            patterns,
            name_matcher,
            field_permissions,
            query,
            allow_restricted_indices,
            restricted_automaton,
            index_automaton: OnceCell::new(),
        })
    }

    pub fn privilege(&self) -> &Arc<IndexPrivilege> {
        &self.privilege
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn field_permissions(&self) -> &FieldPermissions {
        &self.field_permissions
    }

    pub fn query(&self) -> Option<&BTreeSet<DocumentQuery>> {
        self.query.as_ref()
    }

    pub fn has_query(&self) -> bool {
        self.query.is_some()
    }

    pub fn allow_restricted_indices(&self) -> bool {
        self.allow_restricted_indices
    }

    pub fn check_action(&self, action: &str) -> bool {
        self.privilege.check_action(action)
    }

    pub fn check_index(&self, name: &str) -> bool {
        self.name_matcher.test(name)
    }

    /// A missing selector counts as the data selector
    pub fn check_selector(&self, selector: Option<Selector>) -> bool {
        self.privilege
            .check_selector(selector.unwrap_or(Selector::Data))
    }

    /// Automaton over the index names this group covers, built on first use
    pub fn index_automaton(&self) -> AuthzResult<&Automaton> {
        self.index_automaton.get_or_try_init(|| {
            let patterns = automaton::patterns(&self.patterns)?;
            match &self.restricted_automaton {
                Some(restricted) => patterns.minus(restricted),
                None => Ok(patterns),
            }
        })
    }

    /// Whether this group grants everything on every index without restriction
    pub fn is_total(&self) -> bool {
        self.allow_restricted_indices
            && self.name_matcher.is_total()
            && self.privilege.is_all()
            && self.query.is_none()
            && !self.field_permissions.has_field_level_security()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Group{{privilege={}, indices={}, field_permissions={:?}, query={:?}, allow_restricted_indices={}}}",
            self.privilege,
            self.patterns.join(","),
            self.field_permissions,
            self.query,
            self.allow_restricted_indices
        )
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
