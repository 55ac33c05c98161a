//! Changes the process-wide automaton state limit, so it runs in its own binary

use std::sync::Arc;

use shadow_authz::automaton::{self, DEFAULT_MAX_DETERMINIZED_STATES};
use shadow_authz::permission::{FieldPermissions, Group, RestrictedIndices};
use shadow_authz::privilege::PrivilegeRegistry;

#[test]
fn failed_index_automaton_is_not_memoized() {
    let registry = PrivilegeRegistry::new();
    let privilege = registry.get("read").unwrap();
    let group = Group::new(
        Arc::clone(&privilege),
        FieldPermissions::default(),
        None,
        false,
        &RestrictedIndices::none(),
        &["logs-*", "metrics-*"],
    )
    .unwrap();

    automaton::set_max_determinized_states(2).unwrap();
    let failed = group.index_automaton();
    automaton::set_max_determinized_states(DEFAULT_MAX_DETERMINIZED_STATES).unwrap();

    assert!(failed.unwrap_err().is_too_complex());
    let built = group.index_automaton().unwrap();
    assert_eq!(built, &automaton::patterns(["logs-*", "metrics-*"]).unwrap());
    assert!(built.run("logs-2024"));
    assert!(std::ptr::eq(built, group.index_automaton().unwrap()));
}
