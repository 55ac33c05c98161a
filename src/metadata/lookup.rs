//! Read-only abstraction lookup tables

use std::collections::HashMap;

use tracing::warn;

use super::IndexAbstraction;

/// Read-only lookup of index abstractions by name
pub trait IndexLookup {
    fn get(&self, name: &str) -> Option<&IndexAbstraction>;
}

impl IndexLookup for HashMap<String, IndexAbstraction> {
    fn get(&self, name: &str) -> Option<&IndexAbstraction> {
        HashMap::get(self, name)
    }
}

impl<T: IndexLookup + ?Sized> IndexLookup for &T {
    fn get(&self, name: &str) -> Option<&IndexAbstraction> {
        (**self).get(name)
    }
}

/// In-memory lookup table built from indices, data streams and aliases.
///
/// Data streams must be added before aliases that point at them.
#[derive(Debug, Clone, Default)]
pub struct IndicesLookup {
    entries: HashMap<String, IndexAbstraction>,
}

impl IndicesLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a standalone concrete index
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.entries.insert(
            name.clone(),
            IndexAbstraction::ConcreteIndex {
                name,
                parent_data_stream: None,
                failure_index: false,
            },
        );
        self
    }

    /// Add a data stream with its backing and failure-store indices
    pub fn with_data_stream<S: AsRef<str>>(
        mut self,
        name: impl Into<String>,
        indices: &[S],
        failure_indices: &[S],
    ) -> Self {
        let name = name.into();
        let indices: Vec<String> = indices.iter().map(|s| s.as_ref().to_string()).collect();
        let failure_indices: Vec<String> = failure_indices
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect();

        for (members, failure_index) in [(&indices, false), (&failure_indices, true)] {
            for index in members {
                self.entries.insert(
                    index.clone(),
                    IndexAbstraction::ConcreteIndex {
                        name: index.clone(),
                        parent_data_stream: Some(name.clone()),
                        failure_index,
                    },
                );
            }
        }
        self.entries.insert(
            name.clone(),
            IndexAbstraction::DataStream {
                name,
                indices,
                failure_indices,
            },
        );
        self
    }

    /// Add an alias over indices or data streams.
    ///
    /// A data stream member contributes its backing indices; an unknown member
    /// is registered as a standalone index.
    pub fn with_alias<S: AsRef<str>>(mut self, name: impl Into<String>, members: &[S]) -> Self {
        let name = name.into();
        let mut indices = Vec::new();
        for member in members {
            let member = member.as_ref();
            match self.entries.get(member) {
                Some(IndexAbstraction::DataStream {
                    indices: backing, ..
                }) => indices.extend(backing.iter().cloned()),
                Some(IndexAbstraction::ConcreteIndex { .. }) => indices.push(member.to_string()),
                Some(IndexAbstraction::Alias { .. }) => {
                    warn!("Alias [{}] cannot point at alias [{}], skipping", name, member);
                }
                None => {
                    self = self.with_index(member);
                    indices.push(member.to_string());
                }
            }
        }
        self.entries
            .insert(name.clone(), IndexAbstraction::Alias { name, indices });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IndexLookup for IndicesLookup {
    fn get(&self, name: &str) -> Option<&IndexAbstraction> {
        self.entries.get(name)
    }
}

impl From<HashMap<String, IndexAbstraction>> for IndicesLookup {
    fn from(entries: HashMap<String, IndexAbstraction>) -> Self {
        Self { entries }
    }
}
