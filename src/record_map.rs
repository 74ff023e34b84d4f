//! Two-level index over record intents, keyed by (name, kind, value).

use std::collections::HashMap;

use crate::record::{RecordIntent, RecordKind};

/// Index of record intents by DNS name, record kind and record value.
///
/// The last intent inserted at a given (name, kind, value) leaf wins.
/// Conflict resolution uses it to peek at the current occupant of a DNS
/// slot and to drop a whole (name, kind) group in one call.
#[derive(Debug, Default)]
pub struct NestedRecordMap {
    by_name: HashMap<String, HashMap<RecordKind, HashMap<String, RecordIntent>>>,
}

impl NestedRecordMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an intent, replacing any previous occupant of its
    /// (name, kind, value) leaf.
    pub fn insert(&mut self, intent: RecordIntent) {
        let name = intent.record.name().to_string();
        let kind = intent.record.kind();
        let value = intent.record.value();
        self.by_name
            .entry(name)
            .or_default()
            .entry(kind)
            .or_default()
            .insert(value, intent);
    }

    /// The intent at exactly (name, kind, value), if any.
    pub fn get(&self, name: &str, kind: RecordKind, value: &str) -> Option<&RecordIntent> {
        self.by_name.get(name)?.get(&kind)?.get(value)
    }

    /// All intents under (name, kind). Empty when none exist.
    pub fn get_all(&self, name: &str, kind: RecordKind) -> Vec<&RecordIntent> {
        self.by_name
            .get(name)
            .and_then(|kinds| kinds.get(&kind))
            .map(|values| values.values().collect())
            .unwrap_or_default()
    }

    /// An arbitrary intent under (name, kind). Callers use this where at
    /// most one entry can exist (CNAME groups).
    pub fn first(&self, name: &str, kind: RecordKind) -> Option<&RecordIntent> {
        self.by_name
            .get(name)?
            .get(&kind)?
            .values()
            .next()
    }

    /// Drop every intent under (name, kind).
    pub fn remove_kind(&mut self, name: &str, kind: RecordKind) {
        if let Some(kinds) = self.by_name.get_mut(name) {
            kinds.remove(&kind);
            if kinds.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    /// Flatten the map into its intents. Order is unspecified.
    pub fn into_values(self) -> Vec<RecordIntent> {
        self.by_name
            .into_values()
            .flat_map(|kinds| kinds.into_values())
            .flat_map(|values| values.into_values())
            .collect()
    }

    /// Number of intents held.
    pub fn len(&self) -> usize {
        self.by_name
            .values()
            .flat_map(|kinds| kinds.values())
            .map(|values| values.len())
            .sum()
    }

    /// True when no intents are held.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
