//! Index abstractions: concrete indices, aliases and data streams

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::IndexLookup;

/// Kind of an [`IndexAbstraction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractionKind {
    ConcreteIndex,
    Alias,
    DataStream,
}

/// A named entry of the cluster metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexAbstraction {
    ConcreteIndex {
        name: String,
        /// Data stream this index backs, if any
        #[serde(default)]
        parent_data_stream: Option<String>,
        /// Whether this index belongs to the parent's failure store
        #[serde(default)]
        failure_index: bool,
    },
    Alias {
        name: String,
        indices: Vec<String>,
    },
    DataStream {
        name: String,
        indices: Vec<String>,
        #[serde(default)]
        failure_indices: Vec<String>,
    },
}

impl IndexAbstraction {
    pub fn name(&self) -> &str {
        match self {
            IndexAbstraction::ConcreteIndex { name, .. }
            | IndexAbstraction::Alias { name, .. }
            | IndexAbstraction::DataStream { name, .. } => name,
        }
    }

    pub fn kind(&self) -> AbstractionKind {
        match self {
            IndexAbstraction::ConcreteIndex { .. } => AbstractionKind::ConcreteIndex,
            IndexAbstraction::Alias { .. } => AbstractionKind::Alias,
            IndexAbstraction::DataStream { .. } => AbstractionKind::DataStream,
        }
    }

    /// Parent data stream of a backing or failure index
    pub fn parent_data_stream(&self) -> Option<&str> {
        match self {
            IndexAbstraction::ConcreteIndex {
                parent_data_stream, ..
            } => parent_data_stream.as_deref(),
            _ => None,
        }
    }

    /// Whether this is a failure-store index of its parent data stream
    pub fn is_failure_index(&self) -> bool {
        matches!(
            self,
            IndexAbstraction::ConcreteIndex {
                failure_index: true,
                parent_data_stream: Some(_),
                ..
            }
        )
    }

    /// Whether this abstraction expands to other indices
    pub fn can_have_backing_indices(&self) -> bool {
        !matches!(self, IndexAbstraction::ConcreteIndex { .. })
    }

    /// Concrete indices of the data view
    pub fn indices(&self) -> Vec<&str> {
        match self {
            IndexAbstraction::ConcreteIndex { name, .. } => vec![name.as_str()],
            IndexAbstraction::Alias { indices, .. }
            | IndexAbstraction::DataStream { indices, .. } => {
                indices.iter().map(String::as_str).collect()
            }
        }
    }

    /// Concrete indices of the failure view.
    ///
    /// An alias reaches the failure stores of the data streams its member
    /// indices belong to, each store counted once.
    pub fn failure_indices<'a>(&'a self, lookup: &'a dyn IndexLookup) -> Vec<&'a str> {
        match self {
            IndexAbstraction::ConcreteIndex { .. } => Vec::new(),
            IndexAbstraction::DataStream {
                failure_indices, ..
            } => failure_indices.iter().map(String::as_str).collect(),
            IndexAbstraction::Alias { indices, .. } => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for index in indices {
                    let Some(parent) = lookup
                        .get(index)
                        .and_then(IndexAbstraction::parent_data_stream)
                    else {
                        continue;
                    };
                    if !seen.insert(parent) {
                        continue;
                    }
                    if let Some(IndexAbstraction::DataStream {
                        failure_indices, ..
                    }) = lookup.get(parent)
                    {
                        out.extend(failure_indices.iter().map(String::as_str));
                    }
                }
                out
            }
        }
    }
}
