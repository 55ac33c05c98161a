//! Index permissions
//!
//! An [`IndicesPermission`] is an ordered list of [`Group`]s, each granting one
//! privilege over a set of index patterns with optional field-level and
//! document-level restrictions. It answers:
//!
//! - [`check`](IndicesPermission::check): is the action granted anywhere?
//! - [`allowed_resource_matcher`](IndicesPermission::allowed_resource_matcher):
//!   which resources may the action touch?
//! - [`allowed_actions_automaton`](IndicesPermission::allowed_actions_automaton):
//!   which actions are granted on one resource?
//! - [`check_resource_privileges`](IndicesPermission::check_resource_privileges):
//!   are privileges granted over every name a pattern can match?
//! - [`authorize`](IndicesPermission::authorize): is an action granted on a
//!   batch of resources, and with which restrictions per index?
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use shadow_authz::metadata::IndicesLookup;
//! use shadow_authz::permission::{FieldPermissions, FieldPermissionsCache, IndicesPermission, RestrictedIndices};
//! use shadow_authz::privilege::PrivilegeRegistry;
//!
//! let registry = Arc::new(PrivilegeRegistry::new());
//! let mut builder = IndicesPermission::builder(RestrictedIndices::none(), Arc::clone(&registry));
//! builder
//!     .add_group(registry.get("read").unwrap(), FieldPermissions::default(), None, false, &["logs-*"])
//!     .unwrap();
//! let permission = builder.build();
//!
//! let lookup = IndicesLookup::new().with_index("logs-2024");
//! let cache = FieldPermissionsCache::new();
//! let requested = ["logs-2024"];
//! let result = permission
//!     .authorize("indices:data/read/search", &requested, &lookup, &cache)
//!     .unwrap();
//! assert!(result.is_granted());
//! ```

mod access_control;
mod authorize;
mod document;
mod field;
mod group;
mod indices;
mod legacy;
mod resource;
mod resource_privileges;
mod restricted;

pub use access_control::{DlsFlsUsage, IndexAccessControl, IndicesAccessControl};
pub use document::{DocumentPermissions, DocumentQuery};
pub use field::{FieldPermissions, FieldPermissionsCache, FieldPermissionsDefinition};
pub use group::Group;
pub use indices::{IndicesPermission, IndicesPermissionBuilder, IsResourceAuthorizedPredicate};
pub use legacy::{
    grants_legacy_mapping_update, is_mapping_update_action, LEGACY_MAPPING_UPDATE_PRIVILEGES,
    MAPPING_UPDATE_ACTIONS,
};
pub use resource::ResourceView;
pub use resource_privileges::{
    ResourcePrivileges, ResourcePrivilegesMap, ResourcePrivilegesMapBuilder,
};
pub use restricted::RestrictedIndices;
