//! Legacy mapping-update rule
//!
//! Write-family privileges used to permit mapping updates implicitly. That is
//! still honoured for indices and aliases, never for data streams, and every
//! use is reported on the deprecation channel.

use crate::privilege::IndexPrivilege;

/// Actions that update index mappings
pub const MAPPING_UPDATE_ACTIONS: [&str; 2] =
    ["indices:admin/mapping/put", "indices:admin/mapping/auto_put"];

/// Privileges that implicitly permit mapping updates
pub const LEGACY_MAPPING_UPDATE_PRIVILEGES: [&str; 4] = ["create", "create_doc", "index", "write"];

pub fn is_mapping_update_action(action: &str) -> bool {
    MAPPING_UPDATE_ACTIONS.contains(&action)
}

/// Names of `privilege` that carry the legacy mapping-update grant
pub fn legacy_mapping_update_names(privilege: &IndexPrivilege) -> impl Iterator<Item = &str> {
    privilege
        .names()
        .iter()
        .map(String::as_str)
        .filter(|name| LEGACY_MAPPING_UPDATE_PRIVILEGES.contains(name))
}

pub fn grants_legacy_mapping_update(privilege: &IndexPrivilege) -> bool {
    legacy_mapping_update_names(privilege).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::PrivilegeRegistry;

    #[test]
    fn mapping_update_actions() {
        assert!(is_mapping_update_action("indices:admin/mapping/put"));
        assert!(is_mapping_update_action("indices:admin/mapping/auto_put"));
        assert!(!is_mapping_update_action("indices:admin/mappings/get"));
    }

    #[test]
    fn write_family_carries_legacy_grant() {
        let registry = PrivilegeRegistry::new();
        for name in LEGACY_MAPPING_UPDATE_PRIVILEGES {
            assert!(grants_legacy_mapping_update(&registry.get(name).unwrap()));
        }
        assert!(!grants_legacy_mapping_update(&registry.get("read").unwrap()));

        let mixed = registry.resolve(["read", "index"]).unwrap();
        assert_eq!(legacy_mapping_update_names(&mixed).collect::<Vec<_>>(), vec!["index"]);
    }
}
