//! Authorization outcome with per-index restrictions

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::{Lazy, OnceCell};

use crate::core::AuthzResult;

use super::document::DocumentPermissions;
use super::field::FieldPermissions;

/// Field and document restrictions on one index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexAccessControl {
    field_permissions: FieldPermissions,
    document_permissions: DocumentPermissions,
}

impl IndexAccessControl {
    pub fn new(
        field_permissions: FieldPermissions,
        document_permissions: DocumentPermissions,
    ) -> Self {
        Self {
            field_permissions,
            document_permissions,
        }
    }

    pub fn field_permissions(&self) -> &FieldPermissions {
        &self.field_permissions
    }

    pub fn document_permissions(&self) -> &DocumentPermissions {
        &self.document_permissions
    }

    pub fn has_field_level_security(&self) -> bool {
        self.field_permissions.has_field_level_security()
    }

    pub fn has_document_level_security(&self) -> bool {
        self.document_permissions.has_document_level_permissions()
    }
}

static ALLOW_ALL: Lazy<IndexAccessControl> = Lazy::new(IndexAccessControl::default);

/// Which kinds of restriction appear anywhere in an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlsFlsUsage {
    None,
    Dls,
    Fls,
    Both,
}

impl DlsFlsUsage {
    fn of(dls: bool, fls: bool) -> Self {
        match (dls, fls) {
            (false, false) => DlsFlsUsage::None,
            (true, false) => DlsFlsUsage::Dls,
            (false, true) => DlsFlsUsage::Fls,
            (true, true) => DlsFlsUsage::Both,
        }
    }

    pub fn has_document_level_security(self) -> bool {
        matches!(self, DlsFlsUsage::Dls | DlsFlsUsage::Both)
    }

    pub fn has_field_level_security(self) -> bool {
        matches!(self, DlsFlsUsage::Fls | DlsFlsUsage::Both)
    }
}

type IndexMap = HashMap<String, IndexAccessControl>;
type Supplier<'a> = Box<dyn Fn() -> AuthzResult<IndexMap> + 'a>;

/// Result of authorizing an action over a batch of resources.
///
/// The per-index map is computed on first access; callers that only need
/// [`is_granted`](Self::is_granted) never pay for the merge.
pub struct IndicesAccessControl<'a> {
    granted: bool,
    supplier: Option<Supplier<'a>>,
    index_permissions: OnceCell<IndexMap>,
}

impl<'a> IndicesAccessControl<'a> {
    pub(crate) fn new(granted: bool, supplier: Supplier<'a>) -> Self {
        Self {
            granted,
            supplier: Some(supplier),
            index_permissions: OnceCell::new(),
        }
    }

    /// Everything is granted on every index without restriction
    pub fn allow_all() -> Self {
        Self {
            granted: true,
            supplier: None,
            index_permissions: OnceCell::new(),
        }
    }

    /// Whether every requested resource was granted
    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn is_allow_all(&self) -> bool {
        self.supplier.is_none()
    }

    fn map(&self) -> AuthzResult<Option<&IndexMap>> {
        match &self.supplier {
            None => Ok(None),
            Some(supplier) => self
                .index_permissions
                .get_or_try_init(|| supplier())
                .map(Some),
        }
    }

    /// Restrictions for `index`, or `None` if it was not granted
    pub fn index_permissions(&self, index: &str) -> AuthzResult<Option<&IndexAccessControl>> {
        Ok(match self.map()? {
            None => Some(&*ALLOW_ALL),
            Some(map) => map.get(index),
        })
    }

    /// Names of the granted indices, sorted. Empty for [`allow_all`](Self::allow_all).
    pub fn granted_indices(&self) -> AuthzResult<BTreeSet<&str>> {
        Ok(self
            .map()?
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default())
    }

    /// Granted indices carrying field or document restrictions
    pub fn indices_with_field_or_document_level_security(&self) -> AuthzResult<BTreeSet<&str>> {
        Ok(self
            .map()?
            .map(|map| {
                map.iter()
                    .filter(|(_, acl)| {
                        acl.has_field_level_security() || acl.has_document_level_security()
                    })
                    .map(|(name, _)| name.as_str())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn field_and_document_level_security_usage(&self) -> AuthzResult<DlsFlsUsage> {
        let Some(map) = self.map()? else {
            return Ok(DlsFlsUsage::None);
        };
        let dls = map.values().any(IndexAccessControl::has_document_level_security);
        let fls = map.values().any(IndexAccessControl::has_field_level_security);
        Ok(DlsFlsUsage::of(dls, fls))
    }
}

impl fmt::Debug for IndicesAccessControl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicesAccessControl")
            .field("granted", &self.granted)
            .field("allow_all", &self.is_allow_all())
            .field("index_permissions", &self.index_permissions.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::DocumentQuery;
    use std::cell::Cell;

    #[test]
    fn allow_all_grants_everything() {
        let acl = IndicesAccessControl::allow_all();
        assert!(acl.is_granted());
        assert!(acl.is_allow_all());
        let index = acl.index_permissions("anything").unwrap().unwrap();
        assert!(!index.has_field_level_security());
        assert!(!index.has_document_level_security());
        assert!(acl.granted_indices().unwrap().is_empty());
        assert_eq!(
            acl.field_and_document_level_security_usage().unwrap(),
            DlsFlsUsage::None
        );
    }

    #[test]
    fn supplier_runs_once_and_lazily() {
        let calls = Cell::new(0);
        let acl = IndicesAccessControl::new(
            false,
            Box::new(|| {
                calls.set(calls.get() + 1);
                let mut map = HashMap::new();
                map.insert(
                    "logs".to_string(),
                    IndexAccessControl::new(
                        FieldPermissions::default(),
                        DocumentPermissions::filtered_by(BTreeSet::from([DocumentQuery::from(
                            "q",
                        )])),
                    ),
                );
                Ok(map)
            }),
        );
        assert!(!acl.is_granted());
        assert_eq!(calls.get(), 0);
        assert!(acl.index_permissions("logs").unwrap().is_some());
        assert!(acl.index_permissions("other").unwrap().is_none());
        assert_eq!(calls.get(), 1);
        assert_eq!(
            acl.indices_with_field_or_document_level_security().unwrap(),
            BTreeSet::from(["logs"])
        );
        assert_eq!(
            acl.field_and_document_level_security_usage().unwrap(),
            DlsFlsUsage::Dls
        );
        assert_eq!(calls.get(), 1);
    }
}
