//! DNS record values and the intents that declare them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

/// The kind of a DNS record handled by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// An address record mapping a name to an IPv4 address.
    A,
    /// An alias record mapping a name to another name.
    Cname,
}

impl RecordKind {
    /// Canonical wire/label spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Cname => "CNAME",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single DNS record. Exactly one variant per supported kind.
///
/// Equality is variant tag + name + value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Record {
    /// `name` resolves to the IPv4 address `value`.
    A {
        /// DNS name the record answers for.
        name: String,
        /// Target address.
        value: Ipv4Addr,
    },
    /// `name` is an alias for the DNS name `value`.
    Cname {
        /// DNS name the record answers for.
        name: String,
        /// Target name.
        value: String,
    },
}

impl Record {
    /// The DNS name this record answers for.
    pub fn name(&self) -> &str {
        match self {
            Record::A { name, .. } | Record::Cname { name, .. } => name,
        }
    }

    /// The record kind.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::A { .. } => RecordKind::A,
            Record::Cname { .. } => RecordKind::Cname,
        }
    }

    /// The record value rendered as a string.
    pub fn value(&self) -> String {
        match self {
            Record::A { value, .. } => value.to_string(),
            Record::Cname { value, .. } => value.clone(),
        }
    }

    /// Stable `"<type>:<name>:<value>"` key identifying the DNS slot this
    /// record occupies. Two records with the same key are interchangeable
    /// targets for eviction.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.kind(), self.name(), self.value())
    }

    /// Short human-readable form for logs.
    pub fn render(&self) -> String {
        format!("{}: {} -> {}", self.kind(), self.name(), self.value())
    }
}

/// A declaration that a particular record should exist, together with its
/// provenance and priority metadata.
///
/// Full-struct equality (record plus every provenance field) is the "we
/// already own this slot with the same intent" test used during
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIntent {
    /// The record this intent wants present.
    pub record: Record,
    /// Identity of the sync instance that owns the record in the registry.
    pub hostname: String,
    /// Name of the container that declared the record.
    pub container_name: String,
    /// Id of the container that declared the record.
    pub container_id: String,
    /// Creation instant of the owning container. Never changes after
    /// construction; drives the age-based conflict policy.
    pub created: DateTime<Utc>,
    /// Elevates this intent above age-based tie-breaks.
    pub force: bool,
}

impl RecordIntent {
    /// Key of the DNS slot this intent targets; same as [`Record::key`].
    pub fn key(&self) -> String {
        self.record.key()
    }

    /// Short human-readable form for logs.
    pub fn render(&self) -> String {
        format!(
            "{} (owned by {}/{})",
            self.record.render(),
            self.hostname,
            self.container_name
        )
    }

    /// Total order over intents: by creation instant, ties broken by
    /// container id. Used to give conflict filtering a stable input order.
    pub fn age_order(&self, other: &RecordIntent) -> Ordering {
        self.created
            .cmp(&other.created)
            .then_with(|| self.container_id.cmp(&other.container_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn intent(record: Record, container_id: &str, created_secs: i64) -> RecordIntent {
        RecordIntent {
            record,
            hostname: "host-1".to_string(),
            container_name: "web".to_string(),
            container_id: container_id.to_string(),
            created: Utc.timestamp_opt(created_secs, 0).unwrap(),
            force: false,
        }
    }

    #[test]
    fn test_a_record_key() {
        let r = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        assert_eq!(r.key(), "A:api.example.com:10.0.0.1");
    }

    #[test]
    fn test_cname_record_key() {
        let r = Record::Cname {
            name: "api.example.com".to_string(),
            value: "svc.example.com".to_string(),
        };
        assert_eq!(r.key(), "CNAME:api.example.com:svc.example.com");
    }

    #[test]
    fn test_record_equality_is_tag_name_value() {
        let a = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        let b = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        let c = Record::Cname {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".to_string(),
        };
        assert_eq!(a, b);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_intent_key_delegates_to_record() {
        let r = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        let i = intent(r.clone(), "c1", 10);
        assert_eq!(i.key(), r.key());
    }

    #[test]
    fn test_intent_equality_includes_provenance() {
        let r = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        let a = intent(r.clone(), "c1", 10);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.container_id = "c2".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_age_order_ties_break_on_container_id() {
        let r = Record::A {
            name: "api.example.com".to_string(),
            value: "10.0.0.1".parse().unwrap(),
        };
        let a = intent(r.clone(), "aaa", 10);
        let b = intent(r, "bbb", 10);
        assert_eq!(a.age_order(&b), Ordering::Less);
        assert_eq!(b.age_order(&a), Ordering::Greater);
    }
}
