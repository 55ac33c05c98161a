//! Index-level authorization engine.
//!
//! Decides whether a role may perform an action on indices, aliases, data
//! streams and failure stores, and which field-level and document-level
//! restrictions apply to each index it may touch.
//!
//! - [`automaton`] - pattern algebra over index and action names
//! - [`matcher`] - fast name predicates
//! - [`privilege`] - named privileges, selectors and the privilege registry
//! - [`metadata`] - abstraction lookup (indices, aliases, data streams)
//! - [`permission`] - groups, the indices permission and authorization
//! - [`config`] / [`logging`] - ambient setup

pub mod automaton;
pub mod config;
pub mod core;
pub mod logging;
pub mod matcher;
pub mod metadata;
pub mod permission;
pub mod privilege;

pub use crate::config::EngineConfig;
pub use crate::core::{AuthzError, AuthzResult};
pub use crate::permission::{IndicesAccessControl, IndicesPermission, IndicesPermissionBuilder};
pub use crate::privilege::{IndexPrivilege, PrivilegeRegistry, Selector};
