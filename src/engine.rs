//! The sync engine: event ingestion, state updates, periodic reconciliation.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::labels;
use crate::metrics::{self, TickOutcome, Timer};
use crate::reconcile::{filter_record_intents, reconcile_and_validate};
use crate::registry::{RecordRegistry, GLOBAL_LOCK_KEY};
use crate::state::StateTracker;
use crate::watcher::{ContainerEvent, ContainerWatcher};

/// Coordinates event ingestion, state updates and registry reconciliation.
///
/// Two long-lived activities run concurrently: an event task feeding the
/// [`StateTracker`] from the watcher's stream, and a periodic tick that
/// snapshots desired state, filters it, plans against the registry's
/// actual records and applies the plan, all under the registry's global
/// lock.
pub struct SyncEngine {
    cfg: SyncConfig,
    watcher: Arc<dyn ContainerWatcher>,
    registry: Arc<dyn RecordRegistry>,
    state: StateTracker,
}

impl SyncEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        cfg: SyncConfig,
        watcher: Arc<dyn ContainerWatcher>,
        registry: Arc<dyn RecordRegistry>,
    ) -> Self {
        Self {
            cfg,
            watcher,
            registry,
            state: StateTracker::new(),
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Subscribes to container events first, then seeds the state tracker
    /// from the running containers (failures there are logged and repaired
    /// by events), then enters the steady state. On cancellation the
    /// watcher is stopped and the registry closed.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SyncError> {
        info!(
            hostname = %self.cfg.hostname,
            poll_interval = self.cfg.poll_interval,
            "sync engine starting"
        );

        let events = self.watcher.subscribe().await?;

        if let Err(err) = self.prepopulate().await {
            error!(error = %err, "state prepopulation failed, relying on events to repair");
        }

        let event_task = tokio::spawn(event_loop(
            events,
            self.state.clone(),
            self.cfg.clone(),
            shutdown.clone(),
        ));

        let mut ticker = interval(Duration::from_secs(self.cfg.poll_interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("sync engine shutting down");
                    self.watcher.stop();
                    if let Err(err) = event_task.await {
                        error!(error = %err, "event task panicked");
                    }
                    if let Err(err) = self.registry.close().await {
                        error!(error = %err, "error closing registry");
                    }
                    return Ok(());
                }

                _ = ticker.tick() => {
                    debug!("reconciliation tick");
                    let timer = Timer::start();
                    match self.sync_once().await {
                        Ok(()) => {
                            metrics::record_tick(TickOutcome::Success, timer.elapsed());
                            self.state.sweep_removed();
                        }
                        Err(err) => {
                            metrics::record_tick(TickOutcome::Failed, timer.elapsed());
                            error!(error = %err, "reconciliation tick failed");
                        }
                    }
                    metrics::record_state_counts(
                        self.state.running_count(),
                        self.state.intent_count(),
                    );
                }
            }
        }
    }

    /// Seed the state tracker from the containers already running.
    async fn prepopulate(&self) -> Result<(), SyncError> {
        let containers = self.watcher.list_running_containers().await?;
        info!(
            containers = containers.len(),
            "prepopulating state from running containers"
        );
        for event in containers {
            apply_event(&self.state, &self.cfg, event);
        }
        Ok(())
    }

    /// One reconciliation pass under the registry's global lock.
    ///
    /// The desired snapshot is taken inside the lock so the whole
    /// list/plan/apply sequence is atomic from the registry's point of
    /// view. Per-record apply failures are absorbed; only lock acquisition
    /// or listing can fail the tick.
    async fn sync_once(&self) -> Result<(), SyncError> {
        let registry = Arc::clone(&self.registry);
        let state = self.state.clone();

        let task = async move {
            let actual = registry.list().await?;
            let desired = filter_record_intents(state.all_desired_record_intents());
            let plan = reconcile_and_validate(&desired, &actual);

            if plan.is_empty() {
                debug!("registry already converged");
                return Ok(());
            }

            let mut removed = 0usize;
            for intent in &plan.to_remove {
                match registry.remove(intent).await {
                    Ok(()) => removed += 1,
                    Err(err) => {
                        metrics::record_apply_error("remove");
                        error!(record = %intent.render(), error = %err, "error removing record");
                    }
                }
            }

            let mut added = 0usize;
            for intent in &plan.to_add {
                match registry.register(intent).await {
                    Ok(()) => added += 1,
                    Err(err) => {
                        metrics::record_apply_error("register");
                        error!(record = %intent.render(), error = %err, "error registering record");
                    }
                }
            }

            metrics::record_plan_applied(added, removed);
            info!(added, removed, "applied reconciliation plan");
            Ok(())
        }
        .boxed();

        self.registry
            .lock_transaction(&[GLOBAL_LOCK_KEY.to_string()], task)
            .await
    }
}

/// Consume container events until the channel closes or shutdown fires.
async fn event_loop(
    mut events: mpsc::Receiver<ContainerEvent>,
    state: StateTracker,
    cfg: SyncConfig,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("stopping event processing");
                return;
            }

            event = events.recv() => match event {
                Some(event) => apply_event(&state, &cfg, event),
                None => {
                    info!("container event channel closed");
                    return;
                }
            }
        }
    }
}

/// Fold one container event into the state tracker. Events with an empty
/// id are ignored; a start event replaces the container's intents, any
/// other status marks it removed.
fn apply_event(state: &StateTracker, cfg: &SyncConfig, event: ContainerEvent) {
    if event.id.is_empty() {
        return;
    }
    metrics::record_container_event(&event.status);

    if event.is_start() {
        let intents = labels::container_record_intents(&event, cfg);
        if intents.is_empty() {
            return;
        }
        let created = intents[0].created;
        debug!(
            container_id = %event.id,
            container_name = %event.name,
            intents = intents.len(),
            "upserting container intents"
        );
        state.upsert(&event.id, &event.name, created, intents);
    } else {
        state.mark_removed(&event.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn test_config() -> SyncConfig {
        SyncConfig {
            hostname: "host-1".to_string(),
            poll_interval: 1,
            label_prefix: "dns".to_string(),
            host_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    fn start_event(id: &str, created: i64, labels: &[(&str, &str)]) -> ContainerEvent {
        ContainerEvent {
            id: id.to_string(),
            name: format!("ctr-{id}"),
            status: "start".to_string(),
            created: Some(Utc.timestamp_opt(created, 0).unwrap()),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_apply_event_start_upserts() {
        let state = StateTracker::new();
        let cfg = test_config();
        apply_event(
            &state,
            &cfg,
            start_event(
                "c1",
                1,
                &[
                    ("dns.enabled", "true"),
                    ("dns.A.name", "api.example.com"),
                    ("dns.A.value", "10.0.0.1"),
                ],
            ),
        );

        let desired = state.all_desired_record_intents();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].key(), "A:api.example.com:10.0.0.1");
    }

    #[test]
    fn test_apply_event_other_status_marks_removed() {
        let state = StateTracker::new();
        let cfg = test_config();
        apply_event(
            &state,
            &cfg,
            start_event(
                "c1",
                1,
                &[
                    ("dns.enabled", "true"),
                    ("dns.A.name", "api.example.com"),
                    ("dns.A.value", "10.0.0.1"),
                ],
            ),
        );

        let mut dead = start_event("c1", 1, &[]);
        dead.status = "die".to_string();
        apply_event(&state, &cfg, dead);

        assert!(state.all_desired_record_intents().is_empty());
    }

    #[test]
    fn test_apply_event_empty_id_ignored() {
        let state = StateTracker::new();
        let cfg = test_config();
        apply_event(
            &state,
            &cfg,
            ContainerEvent {
                id: String::new(),
                name: "ghost".to_string(),
                status: "start".to_string(),
                created: None,
                labels: HashMap::new(),
            },
        );
        assert_eq!(state.running_count(), 0);
    }

    #[test]
    fn test_apply_event_without_intents_does_not_track() {
        let state = StateTracker::new();
        let cfg = test_config();
        apply_event(&state, &cfg, start_event("c1", 1, &[]));
        assert_eq!(state.running_count(), 0);
    }
}
