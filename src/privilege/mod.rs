//! Index privileges and selectors

mod index_privilege;
mod registry;
mod selector;

pub use index_privilege::{IndexPrivilege, ALL};
pub use registry::{PrivilegeRegistry, NONE};
pub use selector::{
    combine_selector, split_selector_expression, Selector, SelectorPredicate, SELECTOR_SEPARATOR,
};
