//! Translation of container labels into record intents.
//!
//! A container opts in with `<prefix>.enabled=true` and declares records
//! either in base form (`<prefix>.A.name` / `<prefix>.A.value`) or in
//! aliased form (`<prefix>.A.<alias>.name` / `<prefix>.A.<alias>.value`),
//! for the record types `A` and `CNAME`. A per-record
//! `<prefix>.<type>[.<alias>].force` label overrides the container-wide
//! `<prefix>.force` label. Malformed declarations are logged and skipped;
//! errors are always per-record, never fatal to the container.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::record::{Record, RecordIntent, RecordKind};
use crate::validate::is_valid_hostname;
use crate::watcher::ContainerEvent;

/// One record declaration being assembled from its name/value labels.
#[derive(Debug, Default)]
struct LabelPair {
    name: Option<String>,
    value: Option<String>,
}

fn label_is_true(value: Option<&String>) -> bool {
    value.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn kind_from_label(ty: &str) -> Option<RecordKind> {
    match ty {
        "A" => Some(RecordKind::A),
        "CNAME" => Some(RecordKind::Cname),
        _ => None,
    }
}

/// Build the record intents a container's labels declare.
///
/// Returns an empty list when the container has not opted in. The intents
/// share the container's creation instant (falling back to now when the
/// runtime did not report one).
pub fn container_record_intents(event: &ContainerEvent, cfg: &SyncConfig) -> Vec<RecordIntent> {
    let prefix = cfg.label_prefix.as_str();
    let labels = &event.labels;

    if !label_is_true(labels.get(&format!("{prefix}.enabled"))) {
        return Vec::new();
    }

    let mut base: BTreeMap<RecordKind, LabelPair> = BTreeMap::new();
    let mut aliased: BTreeMap<RecordKind, BTreeMap<String, LabelPair>> = BTreeMap::new();

    for (label, value) in labels {
        let Some(rest) = label
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            continue;
        };
        let parts: Vec<&str> = rest.split('.').collect();

        match parts.as_slice() {
            ["enabled"] | ["force"] => {}
            [_, "force"] | [_, _, "force"] => {}
            [ty, key @ ("name" | "value")] => match kind_from_label(ty) {
                Some(kind) => {
                    let pair = base.entry(kind).or_default();
                    if *key == "name" {
                        pair.name = Some(value.clone());
                    } else {
                        pair.value = Some(value.clone());
                    }
                }
                None => {
                    warn!(label = %label, "skipping unsupported record type in label");
                }
            },
            [ty, alias, key @ ("name" | "value")] => match kind_from_label(ty) {
                Some(kind) => {
                    let pair = aliased
                        .entry(kind)
                        .or_default()
                        .entry(alias.to_string())
                        .or_default();
                    if *key == "name" {
                        pair.name = Some(value.clone());
                    } else {
                        pair.value = Some(value.clone());
                    }
                }
                None => {
                    warn!(label = %label, "skipping unsupported record type in label");
                }
            },
            _ => {
                debug!(label = %label, "skipping malformed label");
            }
        }
    }

    let created = event.created.unwrap_or_else(Utc::now);
    let container_force_label = format!("{prefix}.force");
    let mut intents = Vec::new();

    for (kind, pair) in &base {
        let record_force_label = format!("{prefix}.{kind}.force");
        let force = resolve_force(labels, &container_force_label, &record_force_label);
        if let Some(intent) = intent_from_pair(event, cfg, *kind, pair, created, force) {
            intents.push(intent);
        }
    }
    for (kind, aliases) in &aliased {
        for (alias, pair) in aliases {
            let record_force_label = format!("{prefix}.{kind}.{alias}.force");
            let force = resolve_force(labels, &container_force_label, &record_force_label);
            if let Some(intent) = intent_from_pair(event, cfg, *kind, pair, created, force) {
                intents.push(intent);
            }
        }
    }

    intents
}

/// A per-record force label overrides the container-wide one; both default
/// to false.
fn resolve_force(
    labels: &HashMap<String, String>,
    container_force_label: &str,
    record_force_label: &str,
) -> bool {
    match labels.get(record_force_label) {
        Some(value) => value.eq_ignore_ascii_case("true"),
        None => label_is_true(labels.get(container_force_label)),
    }
}

fn intent_from_pair(
    event: &ContainerEvent,
    cfg: &SyncConfig,
    kind: RecordKind,
    pair: &LabelPair,
    created: DateTime<Utc>,
    force: bool,
) -> Option<RecordIntent> {
    let record = match kind {
        RecordKind::A => {
            let name = match &pair.name {
                Some(name) => name.clone(),
                None => {
                    if let Some(value) = &pair.value {
                        warn!(
                            container = %event.name,
                            value = %value,
                            "A record value label found with no matching name label"
                        );
                    }
                    return None;
                }
            };
            let value = match &pair.value {
                Some(raw) => match raw.parse::<Ipv4Addr>() {
                    Ok(ip) => ip,
                    Err(_) => {
                        warn!(
                            container = %event.name,
                            name = %name,
                            value = %raw,
                            "invalid IPv4 address in A record label"
                        );
                        return None;
                    }
                },
                None => {
                    warn!(
                        container = %event.name,
                        name = %name,
                        host_ip = %cfg.host_ip,
                        "A record name label found with no matching value label, using configured host IP"
                    );
                    cfg.host_ip
                }
            };
            if !is_valid_hostname(&name) {
                warn!(container = %event.name, name = %name, "invalid hostname in A record label");
                return None;
            }
            Record::A { name, value }
        }
        RecordKind::Cname => {
            let (name, value) = match (&pair.name, &pair.value) {
                (Some(name), Some(value)) => (name.clone(), value.clone()),
                (None, None) => return None,
                _ => {
                    warn!(
                        container = %event.name,
                        "CNAME record label found with an incomplete name/value pair"
                    );
                    return None;
                }
            };
            if !is_valid_hostname(&name) || !is_valid_hostname(&value) {
                warn!(
                    container = %event.name,
                    name = %name,
                    value = %value,
                    "invalid hostname in CNAME record label"
                );
                return None;
            }
            Record::Cname { name, value }
        }
    };

    Some(RecordIntent {
        record,
        hostname: cfg.hostname.clone(),
        container_name: event.name.clone(),
        container_id: event.id.clone(),
        created,
        force,
    })
}
