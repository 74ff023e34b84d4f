//! Shared test infrastructure for the reconciliation and engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docker_dns_sync::error::SyncError;
use docker_dns_sync::record::{Record, RecordIntent, RecordKind};
use docker_dns_sync::watcher::{ContainerEvent, ContainerWatcher};
use docker_dns_sync::SyncConfig;

// --- Constants ---

pub const HOSTNAME: &str = "host-1";
pub const LABEL_PREFIX: &str = "dns";

// --- Time / intent builders ---

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Build an A intent. Times are integer seconds, as in the policy tables.
pub fn make_a(name: &str, value: &str, container_id: &str, t: i64, force: bool) -> RecordIntent {
    RecordIntent {
        record: Record::A {
            name: name.to_string(),
            value: value.parse().unwrap(),
        },
        hostname: HOSTNAME.to_string(),
        container_name: format!("ctr-{container_id}"),
        container_id: container_id.to_string(),
        created: ts(t),
        force,
    }
}

/// Build a CNAME intent.
pub fn make_cname(
    name: &str,
    value: &str,
    container_id: &str,
    t: i64,
    force: bool,
) -> RecordIntent {
    RecordIntent {
        record: Record::Cname {
            name: name.to_string(),
            value: value.to_string(),
        },
        hostname: HOSTNAME.to_string(),
        container_name: format!("ctr-{container_id}"),
        container_id: container_id.to_string(),
        created: ts(t),
        force,
    }
}

/// Sorted record keys of a set of intents.
pub fn keys_of(intents: &[RecordIntent]) -> Vec<String> {
    let mut keys: Vec<String> = intents.iter().map(RecordIntent::key).collect();
    keys.sort();
    keys
}

/// Assert the coexistence invariant: per DNS name the intents hold either
/// only A records or exactly one CNAME record.
pub fn assert_coexistence(intents: &[RecordIntent]) {
    let names: HashSet<&str> = intents.iter().map(|i| i.record.name()).collect();
    for name in names {
        let a_count = intents
            .iter()
            .filter(|i| i.record.name() == name && i.record.kind() == RecordKind::A)
            .count();
        let cname_count = intents
            .iter()
            .filter(|i| i.record.name() == name && i.record.kind() == RecordKind::Cname)
            .count();
        assert!(
            (cname_count == 0) || (cname_count == 1 && a_count == 0),
            "coexistence violated at {name}: {a_count} A record(s), {cname_count} CNAME record(s)"
        );
    }
}

// --- Config / event builders ---

pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        hostname: HOSTNAME.to_string(),
        poll_interval: 1,
        label_prefix: LABEL_PREFIX.to_string(),
        host_ip: "192.168.1.10".parse().unwrap(),
    }
}

/// A start event for a container declaring a single A record.
pub fn start_event_with_a(id: &str, t: i64, name: &str, value: &str) -> ContainerEvent {
    let labels: HashMap<String, String> = [
        (format!("{LABEL_PREFIX}.enabled"), "true".to_string()),
        (format!("{LABEL_PREFIX}.A.name"), name.to_string()),
        (format!("{LABEL_PREFIX}.A.value"), value.to_string()),
    ]
    .into_iter()
    .collect();

    ContainerEvent {
        id: id.to_string(),
        name: format!("ctr-{id}"),
        status: "start".to_string(),
        created: Some(ts(t)),
        labels,
    }
}

/// A lifecycle event carrying only id and status, as the runtime sends for
/// dead containers.
pub fn status_event(id: &str, status: &str) -> ContainerEvent {
    ContainerEvent {
        id: id.to_string(),
        name: format!("ctr-{id}"),
        status: status.to_string(),
        created: None,
        labels: HashMap::new(),
    }
}

// --- Scripted watcher ---

/// A [`ContainerWatcher`] backed by a prepared container list and an
/// externally fed event channel.
pub struct StubWatcher {
    initial: Vec<ContainerEvent>,
    receiver: Mutex<Option<mpsc::Receiver<ContainerEvent>>>,
    stop: CancellationToken,
}

impl StubWatcher {
    /// Build a watcher listing `initial` containers; the returned sender
    /// feeds its event stream.
    pub fn new(initial: Vec<ContainerEvent>) -> (Arc<Self>, mpsc::Sender<ContainerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let watcher = Arc::new(Self {
            initial,
            receiver: Mutex::new(Some(rx)),
            stop: CancellationToken::new(),
        });
        (watcher, tx)
    }

    /// True once the engine has asked the watcher to stop.
    pub fn stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

#[async_trait]
impl ContainerWatcher for StubWatcher {
    async fn list_running_containers(&self) -> Result<Vec<ContainerEvent>, SyncError> {
        Ok(self.initial.clone())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<ContainerEvent>, SyncError> {
        Ok(self
            .receiver
            .lock()
            .take()
            .expect("subscribe called more than once"))
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}
