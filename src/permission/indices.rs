//! The indices permission: an ordered set of groups and the authorization
//! queries over it
//!
//! Per-action resource matchers are memoized in a concurrent map owned by the
//! permission. A new permission is built whenever the groups change, so the
//! cache is never invalidated.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::automaton::{self, is_lucene_regex, is_simple_match_pattern, Automaton};
use crate::core::{AuthzError, AuthzResult};
use crate::matcher::NameMatcher;
use crate::metadata::IndexAbstraction;
use crate::privilege::{
    split_selector_expression, IndexPrivilege, PrivilegeRegistry, Selector, SelectorPredicate,
};

use super::document::DocumentQuery;
use super::field::FieldPermissions;
use super::group::Group;
use super::legacy;
use super::resource::is_part_of_data_stream;
use super::resource_privileges::ResourcePrivilegesMapBuilder;
use super::restricted::RestrictedIndices;

/// Privilege automaton to the union of index automata granted with it
type IndexGroupAutomata = HashMap<Arc<Automaton>, Automaton>;

#[derive(Debug, Clone)]
struct ResourceClause {
    data: NameMatcher,
    failures: NameMatcher,
    /// Applies to data access on anything outside a data stream
    non_data_stream: NameMatcher,
}

impl ResourceClause {
    fn test(&self, name: &str, abstraction: Option<&IndexAbstraction>, selector: Option<Selector>) -> bool {
        match selector {
            Some(Selector::Failures) => self.failures.test(name),
            _ => {
                self.data.test(name)
                    || (!is_part_of_data_stream(abstraction) && self.non_data_stream.test(name))
            }
        }
    }
}

/// Decides whether a resource is authorized for one action
#[derive(Debug, Clone)]
pub struct IsResourceAuthorizedPredicate {
    clauses: Vec<ResourceClause>,
}

impl IsResourceAuthorizedPredicate {
    pub fn new(data: NameMatcher, failures: NameMatcher, non_data_stream: NameMatcher) -> Self {
        Self {
            clauses: vec![ResourceClause {
                data,
                failures,
                non_data_stream,
            }],
        }
    }

    /// Conjunction of both predicates
    pub fn and(&self, other: &IsResourceAuthorizedPredicate) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Self { clauses }
    }

    /// Test a possibly missing resource by name
    pub fn test(
        &self,
        name: &str,
        abstraction: Option<&IndexAbstraction>,
        selector: Option<Selector>,
    ) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.test(name, abstraction, selector))
    }

    /// Test an existing resource
    pub fn test_abstraction(&self, abstraction: &IndexAbstraction, selector: Option<Selector>) -> bool {
        self.test(abstraction.name(), Some(abstraction), selector)
    }
}

/// Builder for [`IndicesPermission`]
pub struct IndicesPermissionBuilder {
    restricted: RestrictedIndices,
    registry: Arc<PrivilegeRegistry>,
    groups: Vec<Group>,
}

impl IndicesPermissionBuilder {
    pub fn new(restricted: RestrictedIndices, registry: Arc<PrivilegeRegistry>) -> Self {
        Self {
            restricted,
            registry,
            groups: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PrivilegeRegistry> {
        &self.registry
    }

    pub fn add_group<S: AsRef<str>>(
        &mut self,
        privilege: Arc<IndexPrivilege>,
        field_permissions: FieldPermissions,
        query: Option<BTreeSet<DocumentQuery>>,
        allow_restricted_indices: bool,
        patterns: &[S],
    ) -> AuthzResult<&mut Self> {
        let group = Group::new(
            privilege,
            field_permissions,
            query,
            allow_restricted_indices,
            &self.restricted,
            patterns,
        )?;
        debug!("Adding index group {}", group);
        self.groups.push(group);
        Ok(self)
    }

    pub fn build(self) -> IndicesPermission {
        IndicesPermission::new(self.restricted, self.registry, self.groups)
    }
}

/// An ordered set of [`Group`]s
pub struct IndicesPermission {
    pub(crate) restricted: RestrictedIndices,
    pub(crate) registry: Arc<PrivilegeRegistry>,
    pub(crate) groups: Vec<Group>,
    has_field_or_document_level_security: bool,
    allowed_resource_matchers: DashMap<String, Arc<IsResourceAuthorizedPredicate>>,
}

impl IndicesPermission {
    pub fn builder(
        restricted: RestrictedIndices,
        registry: Arc<PrivilegeRegistry>,
    ) -> IndicesPermissionBuilder {
        IndicesPermissionBuilder::new(restricted, registry)
    }

    /// Permission granting nothing
    pub fn none() -> Self {
        Self::new(
            RestrictedIndices::none(),
            Arc::new(PrivilegeRegistry::new()),
            Vec::new(),
        )
    }

    fn new(restricted: RestrictedIndices, registry: Arc<PrivilegeRegistry>, groups: Vec<Group>) -> Self {
        let has_field_or_document_level_security = !groups.iter().any(Group::is_total)
            && groups
                .iter()
                .any(|g| g.has_query() || g.field_permissions().has_field_level_security());
        Self {
            restricted,
            registry,
            groups,
            has_field_or_document_level_security,
            allowed_resource_matchers: DashMap::new(),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn restricted_indices(&self) -> &RestrictedIndices {
        &self.restricted
    }

    pub fn registry(&self) -> &Arc<PrivilegeRegistry> {
        &self.registry
    }

    /// Whether some group restricts fields or documents and none is total
    pub fn has_field_or_document_level_security(&self) -> bool {
        self.has_field_or_document_level_security
    }

    /// Matcher over the resources this permission authorizes for `action`.
    ///
    /// Built on first use per action and shared afterwards.
    pub fn allowed_resource_matcher(
        &self,
        action: &str,
    ) -> AuthzResult<Arc<IsResourceAuthorizedPredicate>> {
        if let Some(existing) = self.allowed_resource_matchers.get(action) {
            return Ok(Arc::clone(existing.value()));
        }
        let built = Arc::new(self.build_resource_matcher(action)?);
        let entry = self
            .allowed_resource_matchers
            .entry(action.to_string())
            .or_insert(built);
        Ok(Arc::clone(entry.value()))
    }

    fn build_resource_matcher(&self, action: &str) -> AuthzResult<IsResourceAuthorizedPredicate> {
        let mut data_ordinary = Vec::new();
        let mut data_restricted = Vec::new();
        let mut failures_ordinary = Vec::new();
        let mut failures_restricted = Vec::new();
        let mut legacy_ordinary = Vec::new();
        let mut legacy_restricted = Vec::new();
        let mapping_update = legacy::is_mapping_update_action(action);

        for group in &self.groups {
            let patterns = group.patterns().iter().cloned();
            if group.check_action(action) {
                let (data, failures) = if group.allow_restricted_indices() {
                    (&mut data_restricted, &mut failures_restricted)
                } else {
                    (&mut data_ordinary, &mut failures_ordinary)
                };
                if group.check_selector(Some(Selector::Data)) {
                    data.extend(patterns.clone());
                }
                if group.check_selector(Some(Selector::Failures)) {
                    failures.extend(patterns);
                }
            } else if mapping_update && legacy::grants_legacy_mapping_update(group.privilege()) {
                if group.allow_restricted_indices() {
                    legacy_restricted.extend(patterns);
                } else {
                    legacy_ordinary.extend(patterns);
                }
            }
        }

        Ok(IsResourceAuthorizedPredicate::new(
            self.index_matcher(&data_ordinary, &data_restricted)?,
            self.index_matcher(&failures_ordinary, &failures_restricted)?,
            self.index_matcher(&legacy_ordinary, &legacy_restricted)?,
        ))
    }

    /// Ordinary patterns never match restricted names; restricted-allowed
    /// patterns match unconditionally
    fn index_matcher(&self, ordinary: &[String], restricted: &[String]) -> AuthzResult<NameMatcher> {
        if ordinary.is_empty() {
            return NameMatcher::of(restricted);
        }
        let matcher = NameMatcher::of(ordinary)?.and_not(self.restricted.matcher());
        if restricted.is_empty() {
            return Ok(matcher);
        }
        Ok(NameMatcher::of(restricted)?.or(&matcher))
    }

    /// Whether any group grants `action` on some index
    pub fn check(&self, action: &str) -> bool {
        let mapping_update = legacy::is_mapping_update_action(action);
        self.groups.iter().any(|group| {
            group.check_action(action)
                || (mapping_update && legacy::grants_legacy_mapping_update(group.privilege()))
        })
    }

    /// Union of the action automata of every group covering `resource`.
    ///
    /// `resource` may carry a `::selector` suffix.
    pub fn allowed_actions_automaton(&self, resource: &str) -> AuthzResult<Automaton> {
        let (name, selector) = split_selector_expression(resource)?;
        automaton::union_all(
            self.groups
                .iter()
                .filter(|group| group.check_selector(selector) && group.check_index(name))
                .map(|group| &**group.privilege().automaton()),
        )
    }

    /// Check whether `privileges` are granted over every name `patterns` can
    /// match.
    ///
    /// With `out` set, every (pattern, privilege) result is recorded and the
    /// call returns whether all were granted. A pattern too complex to
    /// evaluate is recorded as failed, the other patterns are still checked,
    /// and the error is returned at the end. Without `out`, the call stops at
    /// the first denial or error.
    ///
    /// `combine_for_regex` merges the index automata of groups with
    /// overlapping privileges when any pattern is a regex, so a regex spanning
    /// several groups can be recognised as covered.
    pub fn check_resource_privileges<P, Q>(
        &self,
        patterns: &[P],
        allow_restricted_indices: bool,
        privileges: &[Q],
        combine_for_regex: bool,
        mut out: Option<&mut ResourcePrivilegesMapBuilder>,
    ) -> AuthzResult<bool>
    where
        P: AsRef<str>,
        Q: AsRef<str>,
    {
        let combine = combine_for_regex && patterns.iter().any(|p| is_lucene_regex(p.as_ref()));
        let data_groups = self.index_group_automata(combine, Selector::Data)?;
        let failures_groups = if self.contains_privileges_for_failures_selector(privileges)? {
            self.index_group_automata(combine, Selector::Failures)?
        } else {
            HashMap::new()
        };

        let mut first_error = None;
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match self.check_pattern_automaton(pattern, allow_restricted_indices) {
                Ok(automaton) => compiled.push((pattern, Some(automaton))),
                Err(err @ AuthzError::PatternTooComplex { .. }) if out.is_some() => {
                    first_error.get_or_insert(err);
                    compiled.push((pattern, None));
                }
                Err(err) => return Err(err),
            }
        }

        let mut all_match = true;
        for (pattern, check) in compiled {
            let Some(check) = check else {
                if let Some(builder) = out.as_deref_mut() {
                    builder.add_failed_pattern(pattern);
                }
                all_match = false;
                continue;
            };

            if check.is_empty() {
                // The pattern only reaches restricted names; deny rather than guess
                let Some(builder) = out.as_deref_mut() else {
                    return Ok(false);
                };
                for privilege in privileges {
                    builder.add_resource_privilege(pattern, privilege.as_ref(), false);
                }
                all_match = false;
                continue;
            }

            let allowed_data = index_privileges_automaton(&data_groups, &check)?;
            let allowed_failures = index_privileges_automaton(&failures_groups, &check)?;
            for name in privileges {
                let name = name.as_ref();
                let privilege = self.registry.get(name)?;
                let granted = covers(&privilege, Selector::Data, allowed_data.as_ref())
                    || covers(&privilege, Selector::Failures, allowed_failures.as_ref());
                match out.as_deref_mut() {
                    Some(builder) => {
                        builder.add_resource_privilege(pattern, name, granted);
                        all_match &= granted;
                    }
                    None if !granted => return Ok(false),
                    None => {}
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(all_match),
        }
    }

    fn check_pattern_automaton(&self, pattern: &str, allow_restricted_indices: bool) -> AuthzResult<Automaton> {
        let compiled = automaton::pattern(pattern).and_then(|names| {
            if allow_restricted_indices || self.is_concrete_restricted_index(pattern) {
                Ok(names)
            } else {
                names.minus(self.restricted.automaton())
            }
        });
        compiled.map_err(|err| {
            if !err.is_too_complex() {
                return err;
            }
            let text = truncate_pattern(pattern);
            info!("refusing to check privileges against complex index pattern [{}]", text);
            AuthzError::PatternTooComplex { pattern: text }
        })
    }

    fn is_concrete_restricted_index(&self, pattern: &str) -> bool {
        !is_simple_match_pattern(pattern)
            && !is_lucene_regex(pattern)
            && self.restricted.is_restricted(pattern)
    }

    /// Only named failures-only privileges count; raw actions are data access
    fn contains_privileges_for_failures_selector<Q: AsRef<str>>(&self, privileges: &[Q]) -> AuthzResult<bool> {
        for name in privileges {
            let name = name.as_ref();
            if self.registry.is_named(name)
                && self.registry.get(name)?.selector_predicate() == SelectorPredicate::Failures
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Index automata of the groups applying to `selector`, keyed by privilege
    /// automaton.
    ///
    /// When combining, every entry whose privileges overlap a group's also
    /// gains that group's indices under the overlapping privileges.
    fn index_group_automata(&self, combine: bool, selector: Selector) -> AuthzResult<IndexGroupAutomata> {
        let mut all = IndexGroupAutomata::new();
        for group in &self.groups {
            if !group.check_selector(Some(selector)) {
                continue;
            }
            let indices = group.index_automaton()?;
            let privileges = group.privilege().automaton();
            merge_index_automaton(&mut all, Arc::clone(privileges), indices)?;

            if combine {
                let mut combined = Vec::new();
                for (key, value) in &all {
                    let overlap = key.intersection(privileges)?;
                    if !overlap.is_empty() {
                        combined.push((Arc::new(overlap), value.union(indices)?));
                    }
                }
                for (key, value) in combined {
                    merge_index_automaton(&mut all, key, &value)?;
                }
            }
        }
        Ok(all)
    }
}

fn merge_index_automaton(
    all: &mut IndexGroupAutomata,
    privileges: Arc<Automaton>,
    indices: &Automaton,
) -> AuthzResult<()> {
    match all.entry(privileges) {
        Entry::Occupied(mut existing) => {
            let merged = existing.get().union(indices)?;
            existing.insert(merged);
        }
        Entry::Vacant(slot) => {
            slot.insert(indices.clone());
        }
    }
    Ok(())
}

/// Union of the privileges whose index automaton covers `check`; `None` when
/// no group applies at all
fn index_privileges_automaton(
    groups: &IndexGroupAutomata,
    check: &Automaton,
) -> AuthzResult<Option<Automaton>> {
    if groups.is_empty() {
        return Ok(None);
    }
    let mut allowed: Option<Automaton> = None;
    for (privileges, indices) in groups {
        if check.subset_of(indices) {
            allowed = Some(match allowed {
                Some(acc) => acc.union(privileges)?,
                None => (**privileges).clone(),
            });
        }
    }
    Ok(allowed)
}

fn covers(privilege: &IndexPrivilege, selector: Selector, allowed: Option<&Automaton>) -> bool {
    privilege.check_selector(selector)
        && allowed.is_some_and(|allowed| privilege.automaton().subset_of(allowed))
}

fn truncate_pattern(pattern: &str) -> String {
    if pattern.chars().count() > 260 {
        let mut text: String = pattern.chars().take(256).collect();
        text.push_str("...");
        text
    } else {
        pattern.to_string()
    }
}

impl fmt::Debug for IndicesPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicesPermission")
            .field("groups", &self.groups)
            .field("restricted", &self.restricted.patterns())
            .finish()
    }
}
