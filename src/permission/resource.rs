//! Requested resources and how they route to groups

use crate::core::AuthzResult;
use crate::metadata::{IndexAbstraction, IndexLookup};
use crate::privilege::{combine_selector, split_selector_expression, Selector};

use super::group::Group;

/// One requested name, split from its selector and resolved against metadata.
///
/// `abstraction` is `None` for names that do not exist yet; those are still
/// authorized by name.
#[derive(Debug, Clone, Copy)]
pub struct ResourceView<'a> {
    name: &'a str,
    selector: Option<Selector>,
    abstraction: Option<&'a IndexAbstraction>,
}

impl<'a> ResourceView<'a> {
    /// Resolve a requested expression such as `logs` or `logs::failures`
    pub fn resolve(expression: &'a str, lookup: &'a dyn IndexLookup) -> AuthzResult<Self> {
        let (name, selector) = split_selector_expression(expression)?;
        Ok(Self {
            name,
            selector,
            abstraction: lookup.get(name),
        })
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn selector(&self) -> Option<Selector> {
        self.selector
    }

    pub fn abstraction(&self) -> Option<&'a IndexAbstraction> {
        self.abstraction
    }

    /// Key distinguishing a data stream from its own failure store
    pub fn name_with_selector(&self) -> String {
        combine_selector(self.name, self.selector)
    }

    pub fn is_part_of_data_stream(&self) -> bool {
        is_part_of_data_stream(self.abstraction)
    }

    /// Whether `group` covers this resource.
    ///
    /// A failure-store index is covered only through the failures selector of
    /// its data stream. A backing index requested as data is also covered by
    /// grants on its data stream.
    pub fn check_index(&self, group: &Group) -> bool {
        if let Some(abstraction) = self.abstraction {
            if let Some(parent) = abstraction.parent_data_stream() {
                if abstraction.is_failure_index() {
                    return group.check_selector(Some(Selector::Failures))
                        && group.check_index(parent);
                }
                if self.selector.unwrap_or(Selector::Data) == Selector::Data
                    && group.check_selector(Some(Selector::Data))
                    && group.check_index(parent)
                {
                    return true;
                }
            }
        }
        group.check_selector(self.selector) && group.check_index(self.name)
    }

    /// Number of distinct names this resource expands to
    pub fn size(&self, lookup: &dyn IndexLookup) -> usize {
        let Some(abstraction) = self.abstraction else {
            return 1;
        };
        if !abstraction.can_have_backing_indices() {
            return 1;
        }
        let selector = self.selector.unwrap_or(Selector::Data);
        let mut size = 1;
        if selector.should_include_data() {
            size += abstraction.indices().len();
        }
        if selector.should_include_failures() {
            size += abstraction.failure_indices(lookup).len();
        }
        size
    }

    /// Concrete indices behind this resource; none for unknown names
    pub fn resolve_concrete_indices(&self, lookup: &'a dyn IndexLookup) -> Vec<&'a str> {
        match self.abstraction {
            None => Vec::new(),
            Some(abstraction) if !abstraction.can_have_backing_indices() => {
                vec![abstraction.name()]
            }
            Some(abstraction) => match self.selector {
                Some(Selector::Failures) => abstraction.failure_indices(lookup),
                _ => abstraction.indices(),
            },
        }
    }

    pub fn can_have_backing_indices(&self) -> bool {
        self.abstraction
            .is_some_and(IndexAbstraction::can_have_backing_indices)
    }
}

/// A data stream, or an index backing one
pub(crate) fn is_part_of_data_stream(abstraction: Option<&IndexAbstraction>) -> bool {
    match abstraction {
        Some(IndexAbstraction::DataStream { .. }) => true,
        Some(abstraction) => abstraction.parent_data_stream().is_some(),
        None => false,
    }
}
