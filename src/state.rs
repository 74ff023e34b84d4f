//! In-memory tracker of the record intents desired by live containers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::record::RecordIntent;

/// Lifecycle of a tracked container. Transitions running -> removed only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The container is live and its intents count toward the desired set.
    Running,
    /// The container is gone; its intents no longer count.
    Removed,
}

/// Everything tracked for a single container.
#[derive(Debug, Clone)]
pub struct ContainerState {
    /// Container name, for logs.
    pub name: String,
    /// Container creation instant.
    pub created: DateTime<Utc>,
    /// Lifecycle flag.
    pub status: ContainerStatus,
    /// Record intents declared by this container's labels.
    pub intents: Vec<RecordIntent>,
}

/// Thread-safe registry of current desired intents, keyed by container id.
///
/// The only process-wide mutable state in the core. All operations are a
/// map read or write under one mutex; nothing does I/O while holding it.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    inner: Arc<Mutex<HashMap<String, ContainerState>>>,
}

impl StateTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the entry for `container_id` with a running
    /// container holding `intents`.
    pub fn upsert(
        &self,
        container_id: &str,
        name: &str,
        created: DateTime<Utc>,
        intents: Vec<RecordIntent>,
    ) {
        let mut inner = self.inner.lock();
        debug!(
            container_id,
            container_name = name,
            intents = intents.len(),
            "upserting container state"
        );
        inner.insert(
            container_id.to_string(),
            ContainerState {
                name: name.to_string(),
                created,
                status: ContainerStatus::Running,
                intents,
            },
        );
    }

    /// Mark a container as removed. No-op when the id is unknown.
    pub fn mark_removed(&self, container_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.get_mut(container_id) {
            debug!(container_id, "marking container removed");
            state.status = ContainerStatus::Removed;
        }
    }

    /// Point-in-time snapshot of every intent desired by a running
    /// container, sorted by (created, container id, record key) so that
    /// downstream conflict filtering sees a stable order across runs.
    pub fn all_desired_record_intents(&self) -> Vec<RecordIntent> {
        let mut result: Vec<RecordIntent> = {
            let inner = self.inner.lock();
            inner
                .values()
                .filter(|state| state.status == ContainerStatus::Running)
                .flat_map(|state| state.intents.iter().cloned())
                .collect()
        };
        result.sort_by(|a, b| a.age_order(b).then_with(|| a.key().cmp(&b.key())));
        result
    }

    /// Drop every removed entry. Called after a successful reconcile has
    /// observed the removal.
    pub fn sweep_removed(&self) {
        let mut inner = self.inner.lock();
        inner.retain(|_, state| state.status == ContainerStatus::Running);
    }

    /// Number of running containers tracked.
    pub fn running_count(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|s| s.status == ContainerStatus::Running)
            .count()
    }

    /// Number of intents currently desired.
    pub fn intent_count(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|s| s.status == ContainerStatus::Running)
            .map(|s| s.intents.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn a_intent(name: &str, value: &str, container_id: &str, created: i64) -> RecordIntent {
        RecordIntent {
            record: Record::A {
                name: name.to_string(),
                value: value.parse().unwrap(),
            },
            hostname: "host-1".to_string(),
            container_name: "web".to_string(),
            container_id: container_id.to_string(),
            created: ts(created),
            force: false,
        }
    }

    #[test]
    fn test_upsert_then_snapshot() {
        let tracker = StateTracker::new();
        tracker.upsert(
            "c1",
            "web",
            ts(1),
            vec![a_intent("api.example.com", "10.0.0.1", "c1", 1)],
        );

        let desired = tracker.all_desired_record_intents();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].key(), "A:api.example.com:10.0.0.1");
    }

    #[test]
    fn test_upsert_replaces_previous_intents() {
        let tracker = StateTracker::new();
        tracker.upsert(
            "c1",
            "web",
            ts(1),
            vec![a_intent("api.example.com", "10.0.0.1", "c1", 1)],
        );
        tracker.upsert(
            "c1",
            "web",
            ts(1),
            vec![a_intent("api.example.com", "10.0.0.2", "c1", 1)],
        );

        let desired = tracker.all_desired_record_intents();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].key(), "A:api.example.com:10.0.0.2");
    }

    #[test]
    fn test_removed_containers_do_not_contribute() {
        let tracker = StateTracker::new();
        tracker.upsert(
            "c1",
            "web",
            ts(1),
            vec![a_intent("api.example.com", "10.0.0.1", "c1", 1)],
        );
        tracker.mark_removed("c1");

        assert!(tracker.all_desired_record_intents().is_empty());
        assert_eq!(tracker.running_count(), 0);
    }

    #[test]
    fn test_mark_removed_unknown_id_is_noop() {
        let tracker = StateTracker::new();
        tracker.mark_removed("nope");
        assert!(tracker.all_desired_record_intents().is_empty());
    }

    #[test]
    fn test_snapshot_sorted_by_age_then_container_id() {
        let tracker = StateTracker::new();
        tracker.upsert(
            "zzz",
            "young",
            ts(5),
            vec![a_intent("a.example.com", "10.0.0.2", "zzz", 5)],
        );
        tracker.upsert(
            "aaa",
            "old",
            ts(1),
            vec![a_intent("b.example.com", "10.0.0.1", "aaa", 1)],
        );

        let desired = tracker.all_desired_record_intents();
        assert_eq!(desired[0].container_id, "aaa");
        assert_eq!(desired[1].container_id, "zzz");
    }

    #[test]
    fn test_sweep_removed_drops_only_removed() {
        let tracker = StateTracker::new();
        tracker.upsert("c1", "web", ts(1), vec![]);
        tracker.upsert("c2", "db", ts(2), vec![]);
        tracker.mark_removed("c1");

        tracker.sweep_removed();

        assert_eq!(tracker.running_count(), 1);
        // Sweeping again is harmless.
        tracker.sweep_removed();
        assert_eq!(tracker.running_count(), 1);
    }

    #[test]
    fn test_intent_count() {
        let tracker = StateTracker::new();
        tracker.upsert(
            "c1",
            "web",
            ts(1),
            vec![
                a_intent("a.example.com", "10.0.0.1", "c1", 1),
                a_intent("b.example.com", "10.0.0.2", "c1", 1),
            ],
        );
        assert_eq!(tracker.intent_count(), 2);
    }
}
