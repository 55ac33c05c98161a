//! Document-level security

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque role query restricting visible documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentQuery(String);

impl DocumentQuery {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentQuery {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// Rows visible on one index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DocumentPermissions {
    #[default]
    AllowAll,
    /// Documents matching any of the queries
    FilteredBy(BTreeSet<DocumentQuery>),
}

impl DocumentPermissions {
    pub fn filtered_by(queries: BTreeSet<DocumentQuery>) -> Self {
        DocumentPermissions::FilteredBy(queries)
    }

    pub fn has_document_level_permissions(&self) -> bool {
        matches!(self, DocumentPermissions::FilteredBy(_))
    }

    pub fn queries(&self) -> Option<&BTreeSet<DocumentQuery>> {
        match self {
            DocumentPermissions::AllowAll => None,
            DocumentPermissions::FilteredBy(queries) => Some(queries),
        }
    }
}

/// Accumulates the row restrictions of every group granting an index.
///
/// One unrestricted grant makes the result unrestricted for good.
#[derive(Debug, Clone, Default)]
pub(crate) enum DocumentLevelMerge {
    #[default]
    Empty,
    Queries(BTreeSet<DocumentQuery>),
    AllowAll,
}

impl DocumentLevelMerge {
    pub fn add(&mut self, query: Option<&BTreeSet<DocumentQuery>>) {
        let Some(query) = query else {
            *self = DocumentLevelMerge::AllowAll;
            return;
        };
        match self {
            DocumentLevelMerge::AllowAll => {}
            DocumentLevelMerge::Queries(queries) => queries.extend(query.iter().cloned()),
            DocumentLevelMerge::Empty => *self = DocumentLevelMerge::Queries(query.clone()),
        }
    }

    pub fn to_permissions(&self) -> DocumentPermissions {
        match self {
            DocumentLevelMerge::Queries(queries) => {
                DocumentPermissions::FilteredBy(queries.clone())
            }
            DocumentLevelMerge::Empty | DocumentLevelMerge::AllowAll => {
                DocumentPermissions::AllowAll
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(sources: &[&str]) -> BTreeSet<DocumentQuery> {
        sources.iter().map(|s| DocumentQuery::from(*s)).collect()
    }

    #[test]
    fn queries_accumulate() {
        let mut merge = DocumentLevelMerge::default();
        merge.add(Some(&queries(&["q1"])));
        merge.add(Some(&queries(&["q2", "q1"])));
        assert_eq!(
            merge.to_permissions(),
            DocumentPermissions::filtered_by(queries(&["q1", "q2"]))
        );
    }

    #[test]
    fn unrestricted_grant_wins_in_any_order() {
        let mut first = DocumentLevelMerge::default();
        first.add(None);
        first.add(Some(&queries(&["q1"])));
        assert_eq!(first.to_permissions(), DocumentPermissions::AllowAll);

        let mut last = DocumentLevelMerge::default();
        last.add(Some(&queries(&["q1"])));
        last.add(None);
        assert!(!last.to_permissions().has_document_level_permissions());
    }

    #[test]
    fn query_serializes_as_plain_string() {
        let query = DocumentQuery::new(r#"{"term":{"owner":"alice"}}"#);
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#""{\"term\":{\"owner\":\"alice\"}}""#);
    }
}
