//! Batch authorization with field and document restriction merging

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::AuthzResult;
use crate::logging::DEPRECATION_TARGET;
use crate::metadata::IndexLookup;

use super::access_control::{IndexAccessControl, IndicesAccessControl};
use super::document::DocumentLevelMerge;
use super::field::{FieldPermissions, FieldPermissionsCache};
use super::group::Group;
use super::indices::IndicesPermission;
use super::legacy;
use super::resource::ResourceView;

/// Field permissions contributed to one index, usually a single shared value
enum FieldPermissionsSet {
    Single(FieldPermissions),
    Many(HashSet<FieldPermissions>),
}

impl FieldPermissionsSet {
    fn add(&mut self, permissions: &FieldPermissions) {
        match self {
            FieldPermissionsSet::Single(existing) if existing == permissions => {}
            FieldPermissionsSet::Single(existing) => {
                let set = HashSet::from([existing.clone(), permissions.clone()]);
                *self = FieldPermissionsSet::Many(set);
            }
            FieldPermissionsSet::Many(set) => {
                set.insert(permissions.clone());
            }
        }
    }

    fn resolve(&self, cache: &FieldPermissionsCache) -> AuthzResult<FieldPermissions> {
        match self {
            FieldPermissionsSet::Single(permissions) => Ok(permissions.clone()),
            FieldPermissionsSet::Many(set) => cache.union(set),
        }
    }
}

/// Per-index accumulators of the restriction merge
struct Restrictions {
    fields: HashMap<String, FieldPermissionsSet>,
    documents: HashMap<String, DocumentLevelMerge>,
}

impl Restrictions {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: HashMap::with_capacity(capacity),
            documents: HashMap::with_capacity(capacity),
        }
    }

    fn add(&mut self, index: &str, group: &Group) {
        match self.fields.get_mut(index) {
            Some(set) => set.add(group.field_permissions()),
            None => {
                self.fields.insert(
                    index.to_string(),
                    FieldPermissionsSet::Single(group.field_permissions().clone()),
                );
            }
        }
        self.documents
            .entry(index.to_string())
            .or_default()
            .add(group.query());
    }

    fn access_control(&self, index: &str, cache: &FieldPermissionsCache) -> AuthzResult<IndexAccessControl> {
        let fields = match self.fields.get(index) {
            Some(set) => set.resolve(cache)?,
            None => FieldPermissions::default(),
        };
        let documents = self
            .documents
            .get(index)
            .map(DocumentLevelMerge::to_permissions)
            .unwrap_or_default();
        Ok(IndexAccessControl::new(fields, documents))
    }
}

impl IndicesPermission {
    /// Authorize `action` over the requested names.
    ///
    /// The returned decision is granted only if every requested name is. The
    /// per-index restrictions are computed lazily on first access to the
    /// result and cover every granted name and the concrete indices behind it.
    pub fn authorize<'a, S: AsRef<str>>(
        &'a self,
        action: &str,
        requested: &'a [S],
        lookup: &'a dyn IndexLookup,
        cache: &'a FieldPermissionsCache,
    ) -> AuthzResult<IndicesAccessControl<'a>> {
        if self.groups.iter().any(Group::is_total) {
            debug!("Total index group present, allowing [{}] on all indices", action);
            return Ok(IndicesAccessControl::allow_all());
        }

        let mut resources: BTreeMap<String, ResourceView<'a>> = BTreeMap::new();
        let mut total_resource_count = 0;
        for expression in requested {
            let resource = ResourceView::resolve(expression.as_ref(), lookup)?;
            // a data stream and its failure store share the bare name
            resources.insert(resource.name_with_selector(), resource);
            total_resource_count += resource.size(lookup);
        }

        let granted = self.is_action_granted(action, resources.values());
        debug!(
            "Authorized [{}] over {} resources: granted={}",
            action,
            resources.len(),
            granted
        );

        let action = action.to_string();
        Ok(IndicesAccessControl::new(
            granted,
            Box::new(move || {
                self.build_indices_access_control(&action, &resources, total_resource_count, lookup, cache)
            }),
        ))
    }

    /// Whether `action` is granted on every resource
    fn is_action_granted<'r, 'a: 'r>(
        &self,
        action: &str,
        resources: impl IntoIterator<Item = &'r ResourceView<'a>>,
    ) -> bool {
        let mapping_update = legacy::is_mapping_update_action(action);

        for resource in resources {
            let mut granted = false;
            let mut legacy_grant = false;
            let mut deprecations: Vec<&str> = Vec::new();

            for group in &self.groups {
                if !resource.check_index(group) {
                    continue;
                }
                if group.check_action(action) {
                    granted = true;
                    break;
                }
                if mapping_update
                    && !resource.is_part_of_data_stream()
                    && legacy::grants_legacy_mapping_update(group.privilege())
                {
                    legacy_grant = true;
                    deprecations.extend(legacy::legacy_mapping_update_names(group.privilege()));
                }
            }

            if !granted && legacy_grant {
                granted = true;
                for privilege in deprecations {
                    warn!(
                        target: DEPRECATION_TARGET,
                        privilege,
                        action,
                        resource = resource.name(),
                        "the index privilege [{}] allowed the update mapping action [{}] on index [{}], this privilege will not permit mapping updates in the next major release - users who require access to update mappings must be granted explicit privileges",
                        privilege,
                        action,
                        resource.name()
                    );
                }
            }

            if !granted {
                return false;
            }
        }
        true
    }

    fn build_indices_access_control<'a>(
        &self,
        action: &str,
        resources: &BTreeMap<String, ResourceView<'a>>,
        total_resource_count: usize,
        lookup: &'a dyn IndexLookup,
        cache: &FieldPermissionsCache,
    ) -> AuthzResult<HashMap<String, IndexAccessControl>> {
        let mapping_update = legacy::is_mapping_update_action(action);
        let mut restrictions = Restrictions::with_capacity(total_resource_count);
        let mut granted_resources: HashSet<&str> = HashSet::with_capacity(total_resource_count);

        for (resource_name, resource) in resources {
            let concrete_indices = resource.resolve_concrete_indices(lookup);
            let mut granted = false;

            for group in &self.groups {
                if !resource.check_index(group) {
                    continue;
                }
                let grants = group.check_action(action)
                    || (mapping_update
                        && !resource.is_part_of_data_stream()
                        && legacy::grants_legacy_mapping_update(group.privilege()));
                if !grants {
                    continue;
                }
                granted = true;
                for index in &concrete_indices {
                    restrictions.add(index, group);
                }
                if concrete_indices.iter().any(|index| *index != resource_name.as_str()) {
                    restrictions.add(resource_name, group);
                }
            }

            if granted {
                granted_resources.insert(resource_name.as_str());
                if resource.can_have_backing_indices() {
                    for index in &concrete_indices {
                        // an explicitly requested index keeps its own decision
                        if !resources.contains_key(*index) {
                            granted_resources.insert(*index);
                        }
                    }
                }
            }
        }

        let mut index_permissions = HashMap::with_capacity(granted_resources.len());
        for index in granted_resources {
            index_permissions.insert(index.to_string(), restrictions.access_control(index, cache)?);
        }
        Ok(index_permissions)
    }
}
