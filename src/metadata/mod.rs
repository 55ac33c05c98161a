//! Cluster metadata as seen by authorization
//!
//! Authorization never owns metadata; it reads an [`IndexLookup`] supplied
//! per call. [`IndicesLookup`] is a simple in-memory implementation.

mod abstraction;
mod lookup;

pub use abstraction::{AbstractionKind, IndexAbstraction};
pub use lookup::{IndexLookup, IndicesLookup};

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> IndicesLookup {
        IndicesLookup::new()
            .with_index("plain")
            .with_data_stream(
                "logs",
                &[".ds-logs-000001", ".ds-logs-000002"],
                &[".fs-logs-000001"],
            )
            .with_data_stream("metrics", &[".ds-metrics-000001"], &[".fs-metrics-000001"])
            .with_alias("everything", &["logs", "metrics", "plain"])
    }

    #[test]
    fn data_stream_members_know_their_parent() {
        let lookup = lookup();
        let backing = lookup.get(".ds-logs-000001").unwrap();
        assert_eq!(backing.kind(), AbstractionKind::ConcreteIndex);
        assert_eq!(backing.parent_data_stream(), Some("logs"));
        assert!(!backing.is_failure_index());

        let failure = lookup.get(".fs-logs-000001").unwrap();
        assert_eq!(failure.parent_data_stream(), Some("logs"));
        assert!(failure.is_failure_index());

        let plain = lookup.get("plain").unwrap();
        assert_eq!(plain.parent_data_stream(), None);
        assert!(!plain.can_have_backing_indices());
    }

    #[test]
    fn data_stream_views() {
        let lookup = lookup();
        let logs = lookup.get("logs").unwrap();
        assert!(logs.can_have_backing_indices());
        assert_eq!(logs.indices(), vec![".ds-logs-000001", ".ds-logs-000002"]);
        assert_eq!(logs.failure_indices(&lookup), vec![".fs-logs-000001"]);
    }

    #[test]
    fn alias_failure_indices_go_through_parent_streams() {
        let lookup = lookup();
        let alias = lookup.get("everything").unwrap();
        assert_eq!(alias.kind(), AbstractionKind::Alias);
        assert_eq!(
            alias.indices(),
            vec![".ds-logs-000001", ".ds-logs-000002", ".ds-metrics-000001", "plain"]
        );
        assert_eq!(
            alias.failure_indices(&lookup),
            vec![".fs-logs-000001", ".fs-metrics-000001"]
        );
    }

    #[test]
    fn unknown_alias_member_becomes_index() {
        let lookup = IndicesLookup::new().with_alias("a", &["fresh"]);
        assert_eq!(lookup.len(), 2);
        assert_eq!(
            lookup.get("fresh").map(IndexAbstraction::kind),
            Some(AbstractionKind::ConcreteIndex)
        );
    }

    #[test]
    fn abstraction_deserializes_from_json() {
        let json = r#"{"type":"data_stream","name":"logs","indices":["b1"]}"#;
        let parsed: IndexAbstraction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.name(), "logs");
        assert!(parsed.failure_indices(&IndicesLookup::new()).is_empty());
    }
}
