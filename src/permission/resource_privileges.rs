//! Per-pattern privilege check results

use std::collections::BTreeMap;

use serde::Serialize;

/// Privileges checked against one resource pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePrivileges {
    resource: String,
    privileges: BTreeMap<String, bool>,
}

impl ResourcePrivileges {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn privileges(&self) -> &BTreeMap<String, bool> {
        &self.privileges
    }

    /// `None` when the privilege was not checked
    pub fn is_allowed(&self, privilege: &str) -> Option<bool> {
        self.privileges.get(privilege).copied()
    }
}

/// Results of a privilege check over several resource patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePrivilegesMap {
    all_allowed: bool,
    resources: BTreeMap<String, ResourcePrivileges>,
    /// Patterns that could not be evaluated
    failed: Vec<String>,
}

impl ResourcePrivilegesMap {
    pub fn builder() -> ResourcePrivilegesMapBuilder {
        ResourcePrivilegesMapBuilder::default()
    }

    pub fn all_allowed(&self) -> bool {
        self.all_allowed
    }

    pub fn get(&self, resource: &str) -> Option<&ResourcePrivileges> {
        self.resources.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourcePrivileges> {
        self.resources.values()
    }

    pub fn failed_patterns(&self) -> &[String] {
        &self.failed
    }
}

/// Collects results while privileges are checked
#[derive(Debug, Default)]
pub struct ResourcePrivilegesMapBuilder {
    resources: BTreeMap<String, BTreeMap<String, bool>>,
    failed: Vec<String>,
}

impl ResourcePrivilegesMapBuilder {
    /// Record one result. A later denial overrides an earlier grant.
    pub fn add_resource_privilege(&mut self, resource: &str, privilege: &str, allowed: bool) {
        let privileges = self.resources.entry(resource.to_string()).or_default();
        let entry = privileges.entry(privilege.to_string()).or_insert(allowed);
        *entry = *entry && allowed;
    }

    /// Record a pattern that could not be evaluated
    pub fn add_failed_pattern(&mut self, pattern: &str) {
        self.failed.push(pattern.to_string());
    }

    pub fn build(self) -> ResourcePrivilegesMap {
        let all_allowed =
            self.failed.is_empty() && self.resources.values().flat_map(|p| p.values()).all(|v| *v);
        let resources = self
            .resources
            .into_iter()
            .map(|(resource, privileges)| {
                (
                    resource.clone(),
                    ResourcePrivileges {
                        resource,
                        privileges,
                    },
                )
            })
            .collect();
        ResourcePrivilegesMap {
            all_allowed,
            resources,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_results() {
        let mut builder = ResourcePrivilegesMap::builder();
        builder.add_resource_privilege("logs-*", "read", true);
        builder.add_resource_privilege("logs-*", "write", false);
        builder.add_resource_privilege("metrics-*", "read", true);
        let map = builder.build();
        assert!(!map.all_allowed());
        assert_eq!(map.get("logs-*").unwrap().is_allowed("read"), Some(true));
        assert_eq!(map.get("logs-*").unwrap().is_allowed("write"), Some(false));
        assert_eq!(map.get("logs-*").unwrap().is_allowed("delete"), None);
        assert_eq!(map.resources().count(), 2);
    }

    #[test]
    fn denial_is_sticky() {
        let mut builder = ResourcePrivilegesMap::builder();
        builder.add_resource_privilege("a", "read", false);
        builder.add_resource_privilege("a", "read", true);
        assert_eq!(builder.build().get("a").unwrap().is_allowed("read"), Some(false));
    }

    #[test]
    fn failed_pattern_is_not_all_allowed() {
        let mut builder = ResourcePrivilegesMap::builder();
        builder.add_resource_privilege("a", "read", true);
        builder.add_failed_pattern("/(a|b)*/");
        let map = builder.build();
        assert!(!map.all_allowed());
        assert_eq!(map.failed_patterns(), ["/(a|b)*/".to_string()]);
    }

    #[test]
    fn empty_map_is_all_allowed() {
        assert!(ResourcePrivilegesMap::builder().build().all_allowed());
    }
}
