//! Conflict resolution among desired intents and against the registry.
//!
//! Two pure functions form the policy core: [`filter_record_intents`]
//! resolves conflicts *within* the desired set under A-vs-CNAME semantics,
//! and [`reconcile_and_validate`] diffs the filtered desired set against
//! the registry's actual records, simulating evictions and gating every
//! addition on post-eviction validation.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::record::{RecordIntent, RecordKind};
use crate::record_map::NestedRecordMap;
use crate::validate::validate_record;

/// The validated add/remove plan produced by one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    /// Intents to register, deduplicated by record key.
    pub to_add: Vec<RecordIntent>,
    /// Intents to remove, deduplicated by record key.
    pub to_remove: Vec<RecordIntent>,
}

impl ReconcilePlan {
    /// True when the pass found nothing to change.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Pairwise precedence: should `new` take the slot held by `existing`?
///
/// Force beats non-force in either direction; with equal force flags the
/// strictly older container wins and ties keep the incumbent.
fn should_replace_existing(new: &RecordIntent, existing: &RecordIntent) -> bool {
    if new.force && !existing.force {
        return true;
    }
    if !new.force && existing.force {
        return false;
    }
    new.created < existing.created
}

/// Set precedence: should a CNAME `new` displace every A in `existing`?
///
/// Rules:
/// - any existing force and new not force: new loses;
/// - new force and no existing force: new wins;
/// - new force and mixed force: new must be strictly older than every
///   existing force record;
/// - force flags uniform on both sides: new must be strictly older than
///   every existing record.
fn should_replace_all_existing(new: &RecordIntent, existing: &[&RecordIntent]) -> bool {
    if existing.is_empty() {
        return true;
    }

    let any_force = existing.iter().any(|r| r.force);
    let all_force = existing.iter().all(|r| r.force);

    if any_force && !new.force {
        return false;
    }
    if new.force && !any_force {
        return true;
    }
    if new.force && !all_force {
        return existing
            .iter()
            .filter(|r| r.force)
            .all(|r| new.created < r.created);
    }
    existing.iter().all(|r| new.created < r.created)
}

/// Resolve conflicts among candidate intents so that, per DNS name, the
/// result holds either A intents with distinct values or exactly one CNAME
/// intent, never both.
///
/// Deterministic given a stable input order; the state tracker's snapshot
/// provides one.
pub fn filter_record_intents(intents: Vec<RecordIntent>) -> Vec<RecordIntent> {
    debug!("reconciling desired records against each other");

    let mut desired = NestedRecordMap::new();

    for ri in intents {
        let name = ri.record.name().to_string();
        let value = ri.record.value();

        match ri.record.kind() {
            RecordKind::A => {
                if let Some(existing) = desired.first(&name, RecordKind::Cname) {
                    if should_replace_existing(&ri, existing) {
                        desired.remove_kind(&name, RecordKind::Cname);
                        desired.insert(ri);
                    } else {
                        debug!(dropped = %ri.render(), "CNAME intent outranks incoming A intent");
                    }
                } else if let Some(existing) = desired.get(&name, RecordKind::A, &value) {
                    if should_replace_existing(&ri, existing) {
                        desired.insert(ri);
                    } else {
                        debug!(dropped = %ri.render(), "existing A intent outranks incoming one");
                    }
                } else {
                    desired.insert(ri);
                }
            }
            RecordKind::Cname => {
                let existing_a = desired.get_all(&name, RecordKind::A);
                if !existing_a.is_empty() {
                    if should_replace_all_existing(&ri, &existing_a) {
                        desired.remove_kind(&name, RecordKind::A);
                        desired.insert(ri);
                    } else {
                        debug!(dropped = %ri.render(), "A intents outrank incoming CNAME intent");
                    }
                } else if let Some(existing) = desired.first(&name, RecordKind::Cname) {
                    if should_replace_existing(&ri, existing) {
                        desired.remove_kind(&name, RecordKind::Cname);
                        desired.insert(ri);
                    } else {
                        debug!(dropped = %ri.render(), "existing CNAME intent outranks incoming one");
                    }
                } else {
                    desired.insert(ri);
                }
            }
        }
    }

    desired.into_values()
}

/// Decide what the registry must lose for `desired` to take its slot.
///
/// Applies the same pairwise and set precedence policy as the filter, so
/// force monotonicity and the age rules hold against remote records
/// exactly as they do among desired intents. `None` means the desired
/// intent is outranked (or already present) and must be skipped for this
/// pass. `Some(empty)` means the slot is free.
fn conflict_evictions(
    desired: &RecordIntent,
    actual_by_name: &NestedRecordMap,
) -> Option<BTreeMap<String, RecordIntent>> {
    let name = desired.record.name();
    let value = desired.record.value();
    let mut evictions: BTreeMap<String, RecordIntent> = BTreeMap::new();

    match desired.record.kind() {
        RecordKind::A => {
            let actual_cnames = actual_by_name.get_all(name, RecordKind::Cname);
            if let Some(incumbent) = actual_cnames.first() {
                if should_replace_existing(desired, incumbent) {
                    warn!(
                        desired = %desired.render(),
                        evicted = %incumbent.render(),
                        "conflict between local A and remote CNAME, evicting remote"
                    );
                    for ri in &actual_cnames {
                        evictions.insert(ri.key(), (*ri).clone());
                    }
                } else {
                    return None;
                }
            } else if let Some(incumbent) = actual_by_name.get(name, RecordKind::A, &value) {
                if incumbent == desired {
                    // The registry already holds this exact intent.
                    return None;
                } else if should_replace_existing(desired, incumbent) {
                    warn!(
                        desired = %desired.render(),
                        evicted = %incumbent.render(),
                        "conflict between local and remote A record, evicting remote"
                    );
                    evictions.insert(incumbent.key(), incumbent.clone());
                } else {
                    return None;
                }
            }
        }
        RecordKind::Cname => {
            let actual_as = actual_by_name.get_all(name, RecordKind::A);
            if !actual_as.is_empty() {
                if should_replace_all_existing(desired, &actual_as) {
                    warn!(
                        desired = %desired.render(),
                        evicted = actual_as.len(),
                        "conflict between local CNAME and remote A records, evicting remote"
                    );
                    for ri in &actual_as {
                        evictions.insert(ri.key(), (*ri).clone());
                    }
                } else {
                    return None;
                }
            } else {
                let actual_cnames = actual_by_name.get_all(name, RecordKind::Cname);
                if let Some(incumbent) = actual_cnames.first() {
                    if *incumbent == desired {
                        return None;
                    } else if should_replace_existing(desired, incumbent) {
                        warn!(
                            desired = %desired.render(),
                            evicted = %incumbent.render(),
                            "conflict between local and remote CNAME record, evicting remote"
                        );
                        for ri in &actual_cnames {
                            evictions.insert(ri.key(), (*ri).clone());
                        }
                    } else {
                        return None;
                    }
                }
            }
        }
    }

    Some(evictions)
}

/// Diff the filtered desired set against the registry's actual records and
/// produce a validated add/remove plan.
///
/// Actuals that nothing desires are removed outright as stale. An actual
/// whose key is undesired but whose DNS name is still contested by a
/// desired record of the other kind (or by another CNAME) is not stale:
/// it is handed to the per-desired conflict analysis, where the
/// precedence policy decides whether it is evicted or the desired intent
/// is dropped. Proposed evictions are committed only if the desired
/// intent itself validates against the simulated post-eviction state, so
/// a malformed intent can never destroy a working record.
pub fn reconcile_and_validate(desired: &[RecordIntent], actual: &[RecordIntent]) -> ReconcilePlan {
    debug!(
        desired = desired.len(),
        actual = actual.len(),
        "reconciling desired records against the registry"
    );

    let mut to_add: BTreeMap<String, RecordIntent> = BTreeMap::new();
    let mut to_remove: BTreeMap<String, RecordIntent> = BTreeMap::new();

    let desired_keys: HashSet<String> = desired.iter().map(RecordIntent::key).collect();
    let mut desired_a_names: HashSet<&str> = HashSet::new();
    let mut desired_cname_names: HashSet<&str> = HashSet::new();
    for d in desired {
        match d.record.kind() {
            RecordKind::A => {
                desired_a_names.insert(d.record.name());
            }
            RecordKind::Cname => {
                desired_cname_names.insert(d.record.name());
            }
        }
    }

    let mut actual_by_name = NestedRecordMap::new();
    for ri in actual {
        // An actual record whose slot a desired record is contesting must
        // survive stale removal so the precedence policy can decide it: an
        // actual A is contested by a desired CNAME wanting its name, an
        // actual CNAME by any desired record wanting its name.
        let contested = match ri.record.kind() {
            RecordKind::A => desired_cname_names.contains(ri.record.name()),
            RecordKind::Cname => {
                desired_a_names.contains(ri.record.name())
                    || desired_cname_names.contains(ri.record.name())
            }
        };
        if desired_keys.contains(&ri.key()) || contested {
            actual_by_name.insert(ri.clone());
        } else {
            info!(record = %ri.render(), "removing stale record");
            to_remove.insert(ri.key(), ri.clone());
        }
    }

    for d in desired {
        let evictions = match conflict_evictions(d, &actual_by_name) {
            Some(evictions) => evictions,
            None => continue,
        };

        // Registry state as it would look after every removal committed so
        // far plus this intent's evictions.
        let simulated: Vec<RecordIntent> = actual
            .iter()
            .filter(|ri| {
                let key = ri.key();
                !to_remove.contains_key(&key) && !evictions.contains_key(&key)
            })
            .cloned()
            .collect();

        match validate_record(d, &simulated) {
            Ok(()) => {
                info!(record = %d.render(), "adding record");
                to_add.insert(d.key(), d.clone());
                to_remove.extend(evictions);
            }
            Err(err) => {
                warn!(record = %d.record.render(), error = %err, "skipping invalid record");
            }
        }
    }

    ReconcilePlan {
        to_add: to_add.into_values().collect(),
        to_remove: to_remove.into_values().collect(),
    }
}
