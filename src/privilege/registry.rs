//! Privilege registry
//!
//! Resolves privilege names to compiled [`IndexPrivilege`]s. Names are either
//! one of the built-in named privileges or raw action patterns
//! (`indices:data/read/*`). Resolved sets are memoized so every caller asking
//! for the same names shares one compiled privilege.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::core::{AuthzError, AuthzResult};

use super::index_privilege::{IndexPrivilege, ALL};
use super::selector::SelectorPredicate;

/// Name of the privilege granting nothing
pub const NONE: &str = "none";

struct NamedPrivilege {
    patterns: &'static [&'static str],
    selector: SelectorPredicate,
}

const fn data(patterns: &'static [&'static str]) -> NamedPrivilege {
    NamedPrivilege {
        patterns,
        selector: SelectorPredicate::Data,
    }
}

const fn failures(patterns: &'static [&'static str]) -> NamedPrivilege {
    NamedPrivilege {
        patterns,
        selector: SelectorPredicate::Failures,
    }
}

const READ_ACTIONS: &[&str] = &[
    "indices:data/read/*",
    "indices:admin/resolve/index",
    "indices:admin/resolve/cluster",
];

const MANAGE_ACTIONS: &[&str] = &["indices:monitor/*", "indices:admin/*"];

fn builtins() -> HashMap<&'static str, NamedPrivilege> {
    HashMap::from([
        (NONE, data(&[])),
        (
            ALL,
            NamedPrivilege {
                patterns: &["indices:*", "internal:transport/proxy/indices:*"],
                selector: SelectorPredicate::DataAndFailures,
            },
        ),
        ("read", data(READ_ACTIONS)),
        (
            "read_cross_cluster",
            data(&[
                "internal:transport/proxy/indices:data/read/*",
                "indices:admin/shards/search_shards",
                "indices:data/read/field_caps*",
            ]),
        ),
        (
            "create",
            data(&[
                "indices:data/write/index*",
                "indices:data/write/bulk*",
                "indices:data/write/simulate/bulk*",
            ]),
        ),
        (
            "create_doc",
            data(&[
                "indices:data/write/index",
                "indices:data/write/index[*",
                "indices:data/write/bulk*",
                "indices:data/write/simulate/bulk*",
            ]),
        ),
        (
            "index",
            data(&[
                "indices:data/write/index*",
                "indices:data/write/update*",
                "indices:data/write/bulk*",
                "indices:data/write/simulate/bulk*",
            ]),
        ),
        (
            "delete",
            data(&["indices:data/write/delete*", "indices:data/write/bulk*"]),
        ),
        ("write", data(&["indices:data/write/*"])),
        ("monitor", data(&["indices:monitor/*"])),
        ("manage", data(MANAGE_ACTIONS)),
        (
            "create_index",
            data(&[
                "indices:admin/create",
                "indices:admin/auto_create",
                "indices:admin/data_stream/create",
            ]),
        ),
        (
            "delete_index",
            data(&["indices:admin/delete", "indices:admin/data_stream/delete"]),
        ),
        (
            "view_index_metadata",
            data(&[
                "indices:admin/aliases/get",
                "indices:admin/get",
                "indices:admin/mappings/get",
                "indices:admin/mappings/fields/get*",
                "indices:monitor/settings/get",
                "indices:admin/resolve/index",
                "indices:admin/data_stream/get",
                "indices:admin/ilm/explain",
            ]),
        ),
        (
            "maintenance",
            data(&[
                "indices:admin/refresh*",
                "indices:admin/flush*",
                "indices:admin/synced_flush",
                "indices:admin/forcemerge*",
            ]),
        ),
        (
            "auto_configure",
            data(&[
                "indices:admin/auto_create",
                "indices:admin/mapping/auto_put",
                "indices:admin/data_stream/create",
            ]),
        ),
        (
            "manage_follow_index",
            data(&[
                "indices:admin/xpack/ccr/put_follow",
                "indices:admin/xpack/ccr/unfollow",
                "indices:admin/close",
                "indices:admin/data_stream/promote",
            ]),
        ),
        ("manage_ilm", data(&["indices:admin/ilm/*"])),
        (
            "manage_data_stream_lifecycle",
            data(&["indices:admin/data_stream/lifecycle/*"]),
        ),
        ("read_failure_store", failures(READ_ACTIONS)),
        ("manage_failure_store", failures(MANAGE_ACTIONS)),
    ])
}

/// Whether `name` is a raw action pattern rather than a named privilege
fn is_action_pattern(name: &str) -> bool {
    name.starts_with("indices:") || name.starts_with("internal:")
}

/// Registry of index privileges
pub struct PrivilegeRegistry {
    named: HashMap<&'static str, NamedPrivilege>,
    cache: DashMap<BTreeSet<String>, Arc<IndexPrivilege>>,
}

impl PrivilegeRegistry {
    pub fn new() -> Self {
        Self {
            named: builtins(),
            cache: DashMap::new(),
        }
    }

    /// Names of all built-in privileges, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.named.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Whether `name` is a built-in named privilege
    pub fn is_named(&self, name: &str) -> bool {
        self.named.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Resolve a single privilege name
    pub fn get(&self, name: &str) -> AuthzResult<Arc<IndexPrivilege>> {
        self.resolve([name])
    }

    /// The maximal privilege
    pub fn all(&self) -> AuthzResult<Arc<IndexPrivilege>> {
        self.get(ALL)
    }

    /// Resolve a set of privilege names into one privilege.
    ///
    /// `all` anywhere in the set yields `all`; `none` contributes nothing.
    pub fn resolve<I, S>(&self, names: I) -> AuthzResult<Arc<IndexPrivilege>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if is_action_pattern(name) {
                key.insert(name.to_string());
            } else {
                let lower = name.to_ascii_lowercase();
                if !self.named.contains_key(lower.as_str()) {
                    return Err(AuthzError::UnknownPrivilege(name.to_string()));
                }
                key.insert(lower);
            }
        }
        if key.contains(ALL) {
            key = BTreeSet::from([ALL.to_string()]);
        } else if key.len() > 1 {
            key.remove(NONE);
        } else if key.is_empty() {
            key.insert(NONE.to_string());
        }

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let built = Arc::new(self.build(&key)?);
        let entry = self.cache.entry(key).or_insert(built);
        Ok(Arc::clone(entry.value()))
    }

    fn build(&self, names: &BTreeSet<String>) -> AuthzResult<IndexPrivilege> {
        let mut patterns: Vec<String> = Vec::new();
        let mut failures_only = Vec::new();
        let mut data_names = Vec::new();
        let mut predicate = SelectorPredicate::Data;

        for name in names {
            match self.named.get(name.as_str()) {
                Some(named) => {
                    patterns.extend(named.patterns.iter().map(|p| p.to_string()));
                    match named.selector {
                        SelectorPredicate::Failures => failures_only.push(name.as_str()),
                        SelectorPredicate::DataAndFailures => {
                            predicate = SelectorPredicate::DataAndFailures
                        }
                        SelectorPredicate::Data => data_names.push(name.as_str()),
                    }
                }
                None => {
                    patterns.push(name.clone());
                    data_names.push(name.as_str());
                }
            }
        }

        if !failures_only.is_empty() {
            if !data_names.is_empty() {
                return Err(AuthzError::MixedSelectorPrivileges(format!(
                    "failure store privileges [{}] cannot be combined with [{}]",
                    failures_only.join(","),
                    data_names.join(",")
                )));
            }
            predicate = SelectorPredicate::Failures;
        }

        debug!(
            "Compiling index privilege [{}] with {} action patterns",
            names.iter().cloned().collect::<Vec<_>>().join(","),
            patterns.len()
        );
        IndexPrivilege::new(names.clone(), patterns, predicate)
    }
}

impl Default for PrivilegeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::Selector;

    #[test]
    fn named_privileges_resolve() {
        let registry = PrivilegeRegistry::new();
        let read = registry.get("read").unwrap();
        assert!(read.check_action("indices:data/read/search"));
        assert!(!read.check_action("indices:data/write/index"));
        assert!(read.check_selector(Selector::Data));
        assert!(!read.check_selector(Selector::Failures));
        assert!(!read.is_all());
    }

    #[test]
    fn names_are_case_insensitive() {
        let registry = PrivilegeRegistry::new();
        let upper = registry.get("READ").unwrap();
        let lower = registry.get("read").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
    }

    #[test]
    fn all_absorbs_everything() {
        let registry = PrivilegeRegistry::new();
        let all = registry.resolve(["read", "all"]).unwrap();
        assert!(all.is_all());
        assert!(all.check_action("indices:admin/create"));
        assert!(all.check_selector(Selector::Failures));
        assert!(all.automaton().subset_of(registry.all().unwrap().automaton()));
    }

    #[test]
    fn resolution_is_memoized() {
        let registry = PrivilegeRegistry::new();
        let a = registry.resolve(["write", "read"]).unwrap();
        let b = registry.resolve(["read", "write"]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.check_action("indices:data/read/get"));
        assert!(a.check_action("indices:data/write/delete"));
    }

    #[test]
    fn raw_action_patterns() {
        let registry = PrivilegeRegistry::new();
        let p = registry.get("indices:data/read/search*").unwrap();
        assert!(p.check_action("indices:data/read/search"));
        assert!(!p.check_action("indices:data/read/get"));
        assert!(p.check_selector(Selector::Data));
    }

    #[test]
    fn unknown_privilege_is_rejected() {
        let registry = PrivilegeRegistry::new();
        assert!(matches!(
            registry.get("bogus"),
            Err(AuthzError::UnknownPrivilege(name)) if name == "bogus"
        ));
    }

    #[test]
    fn failure_store_privileges() {
        let registry = PrivilegeRegistry::new();
        let rfs = registry.get("read_failure_store").unwrap();
        assert!(rfs.check_selector(Selector::Failures));
        assert!(!rfs.check_selector(Selector::Data));
        assert!(matches!(
            registry.resolve(["read", "read_failure_store"]),
            Err(AuthzError::MixedSelectorPrivileges(_))
        ));
        let both = registry
            .resolve(["read_failure_store", "manage_failure_store"])
            .unwrap();
        assert!(both.check_selector(Selector::Failures));
    }

    #[test]
    fn none_grants_nothing() {
        let registry = PrivilegeRegistry::new();
        let none = registry.get("none").unwrap();
        assert!(none.automaton().is_empty());
        assert!(!none.check_action("indices:data/read/search"));
        let read = registry.resolve(["none", "read"]).unwrap();
        assert!(Arc::ptr_eq(&read, &registry.get("read").unwrap()));
    }
}
