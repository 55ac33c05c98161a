//! Field-level security
//!
//! A [`FieldPermissions`] is built from one or more grant/except definitions
//! and compiles them into a single automaton over field names. Two
//! permissions are equal when their definitions are equal, which lets the
//! merge engine deduplicate the permissions contributed by several groups.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::automaton::{self, Automaton};
use crate::core::{AuthzError, AuthzResult};

/// Metadata fields readable regardless of field-level security
const METADATA_FIELDS: &[&str] = &[
    "_id",
    "_index",
    "_routing",
    "_source",
    "_version",
    "_seq_no",
    "_primary_term",
    "_ignored",
    "_doc_count",
    "_tier",
    "_field_names",
    "_nested_path",
    "_data_stream_timestamp",
];

/// One grant/except pair as written in a role
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldPermissionsDefinition {
    pub grant: Vec<String>,
    #[serde(default)]
    pub except: Vec<String>,
}

impl FieldPermissionsDefinition {
    fn compile(&self) -> AuthzResult<Automaton> {
        let grant = automaton::patterns(&self.grant)?;
        let except = automaton::patterns(&self.except)?;
        if !except.subset_of(&grant) {
            return Err(AuthzError::InvalidConfig(format!(
                "exceptions for field permissions must be a subset of the granted fields but [{}] is not a subset of [{}]",
                self.except.join(","),
                self.grant.join(",")
            )));
        }
        grant.minus(&except)
    }
}

impl Default for FieldPermissionsDefinition {
    fn default() -> Self {
        Self {
            grant: vec!["*".to_string()],
            except: Vec::new(),
        }
    }
}

static DEFAULT: Lazy<FieldPermissions> = Lazy::new(|| FieldPermissions {
    definitions: Arc::from(vec![FieldPermissionsDefinition::default()]),
    automaton: Arc::new(Automaton::total()),
});

/// Compiled field permissions
#[derive(Clone)]
pub struct FieldPermissions {
    definitions: Arc<[FieldPermissionsDefinition]>,
    automaton: Arc<Automaton>,
}

impl FieldPermissions {
    /// Permissions for a single definition
    pub fn new(definition: FieldPermissionsDefinition) -> AuthzResult<Self> {
        let automaton = definition.compile()?;
        Ok(Self {
            definitions: Arc::from(vec![definition]),
            automaton: Arc::new(automaton),
        })
    }

    /// Shorthand for a definition built from grant and except patterns
    pub fn grant<S: AsRef<str>>(grant: &[S], except: &[S]) -> AuthzResult<Self> {
        Self::new(FieldPermissionsDefinition {
            grant: grant.iter().map(|s| s.as_ref().to_string()).collect(),
            except: except.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    pub fn definitions(&self) -> &[FieldPermissionsDefinition] {
        &self.definitions
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Whether any field is hidden
    pub fn has_field_level_security(&self) -> bool {
        !self.automaton.is_total()
    }

    /// Whether `field` is readable
    pub fn grants_access_to(&self, field: &str) -> bool {
        METADATA_FIELDS.contains(&field) || self.automaton.run(field)
    }
}

impl Default for FieldPermissions {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

impl PartialEq for FieldPermissions {
    fn eq(&self, other: &Self) -> bool {
        self.definitions == other.definitions
    }
}

impl Eq for FieldPermissions {}

impl Hash for FieldPermissions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.definitions.hash(state);
    }
}

impl fmt::Debug for FieldPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPermissions")
            .field("definitions", &self.definitions)
            .field("has_field_level_security", &self.has_field_level_security())
            .finish()
    }
}

/// Memoizing union of field permissions
#[derive(Default)]
pub struct FieldPermissionsCache {
    unions: DashMap<Vec<FieldPermissionsDefinition>, FieldPermissions>,
}

impl FieldPermissionsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of several permissions; a field is readable if any of them grants it.
    ///
    /// The result does not depend on input order.
    pub fn union<'a, I>(&self, permissions: I) -> AuthzResult<FieldPermissions>
    where
        I: IntoIterator<Item = &'a FieldPermissions>,
    {
        let mut definitions = BTreeSet::new();
        let mut automata = Vec::new();
        for permission in permissions {
            if !permission.has_field_level_security() {
                return Ok(FieldPermissions::default());
            }
            definitions.extend(permission.definitions.iter().cloned());
            automata.push(Arc::clone(&permission.automaton));
        }
        let key: Vec<FieldPermissionsDefinition> = definitions.into_iter().collect();
        if key.is_empty() {
            return Ok(FieldPermissions::default());
        }
        if let Some(cached) = self.unions.get(&key) {
            return Ok(cached.value().clone());
        }

        let automaton = automaton::union_all(automata.iter().map(|a| &**a))?;
        let union = FieldPermissions {
            definitions: Arc::from(key.clone()),
            automaton: Arc::new(automaton),
        };
        Ok(self.unions.entry(key).or_insert(union).value().clone())
    }

    pub fn len(&self) -> usize {
        self.unions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_field_level_security() {
        let fp = FieldPermissions::default();
        assert!(!fp.has_field_level_security());
        assert!(fp.grants_access_to("anything"));
        assert_eq!(fp, FieldPermissions::grant(&["*"], &[]).unwrap());
    }

    #[test]
    fn grant_and_except() {
        let fp = FieldPermissions::grant(&["user.*", "message"], &["user.password"]).unwrap();
        assert!(fp.has_field_level_security());
        assert!(fp.grants_access_to("user.name"));
        assert!(fp.grants_access_to("message"));
        assert!(!fp.grants_access_to("user.password"));
        assert!(!fp.grants_access_to("secret"));
        assert!(fp.grants_access_to("_id"));
    }

    #[test]
    fn except_must_be_within_grant() {
        let err = FieldPermissions::grant(&["user.*"], &["secret"]).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidConfig(_)));
    }

    #[test]
    fn equality_follows_definitions() {
        let a = FieldPermissions::grant(&["a*"], &[]).unwrap();
        let b = FieldPermissions::grant(&["a*"], &[]).unwrap();
        let c = FieldPermissions::grant(&["b*"], &[]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn union_is_order_independent_and_memoized() {
        let cache = FieldPermissionsCache::new();
        let a = FieldPermissions::grant(&["a*"], &[]).unwrap();
        let b = FieldPermissions::grant(&["b*"], &[]).unwrap();
        let ab = cache.union([&a, &b]).unwrap();
        let ba = cache.union([&b, &a]).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(cache.len(), 1);
        assert!(ab.grants_access_to("apple"));
        assert!(ab.grants_access_to("banana"));
        assert!(!ab.grants_access_to("cherry"));
    }

    #[test]
    fn union_with_unrestricted_is_unrestricted() {
        let cache = FieldPermissionsCache::new();
        let a = FieldPermissions::grant(&["a*"], &[]).unwrap();
        let all = FieldPermissions::default();
        let union = cache.union([&a, &all]).unwrap();
        assert!(!union.has_field_level_security());
        assert!(cache.is_empty());
    }
}
