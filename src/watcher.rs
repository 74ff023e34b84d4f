//! Container runtime observation.
//!
//! The [`ContainerWatcher`] trait is the seam between the sync engine and
//! the container runtime; [`DockerWatcher`] implements it against the
//! Docker Engine API with a reconnecting event stream.

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, EventMessage};
use bollard::system::EventsOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;

/// The lifecycle status that marks a container as live. Any other status
/// on an event means the container is dead or going away.
pub const STATUS_START: &str = "start";

const EVENT_CHANNEL_CAPACITY: usize = 128;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// A container lifecycle notification, also used as the listing entry for
/// running containers (the fields are identical).
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    /// Container id.
    pub id: String,
    /// Container name, with the runtime's leading slash stripped.
    pub name: String,
    /// Lifecycle status string as reported by the runtime.
    pub status: String,
    /// Container creation instant, when the runtime reported one.
    pub created: Option<DateTime<Utc>>,
    /// Container labels. Empty for stop/die events.
    pub labels: HashMap<String, String>,
}

impl ContainerEvent {
    /// True when this event marks the container as live.
    pub fn is_start(&self) -> bool {
        self.status == STATUS_START
    }
}

/// Observes the container runtime for lifecycle changes.
#[async_trait]
pub trait ContainerWatcher: Send + Sync {
    /// List containers currently running, as start events.
    async fn list_running_containers(&self) -> Result<Vec<ContainerEvent>, SyncError>;

    /// Start streaming lifecycle events. The stream runs until [`stop`] is
    /// called or the receiver is dropped.
    ///
    /// [`stop`]: ContainerWatcher::stop
    async fn subscribe(&self) -> Result<mpsc::Receiver<ContainerEvent>, SyncError>;

    /// Signal the event stream to terminate.
    fn stop(&self);
}

/// [`ContainerWatcher`] over the local Docker daemon.
pub struct DockerWatcher {
    docker: Docker,
    stop: CancellationToken,
}

impl DockerWatcher {
    /// Connect to the local Docker daemon with default settings (unix
    /// socket on Linux).
    pub fn connect() -> Result<Self, SyncError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            stop: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl ContainerWatcher for DockerWatcher {
    async fn list_running_containers(&self) -> Result<Vec<ContainerEvent>, SyncError> {
        let opts = ListContainersOptions::<String> {
            all: false,
            filters: [("status".to_string(), vec!["running".to_string()])]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(opts)).await?;
        Ok(summaries.into_iter().filter_map(summary_event).collect())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<ContainerEvent>, SyncError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(watch_events(self.docker.clone(), tx, self.stop.clone()));
        Ok(rx)
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

/// Convert a container listing entry into a start event.
fn summary_event(summary: ContainerSummary) -> Option<ContainerEvent> {
    let id = summary.id?;
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_else(|| id.clone());
    let created = summary
        .created
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Some(ContainerEvent {
        id,
        name,
        status: STATUS_START.to_string(),
        created,
        labels: summary.labels.unwrap_or_default(),
    })
}

/// Stream Docker events into `tx` until stopped, reconnecting with a short
/// delay whenever the stream drops.
async fn watch_events(docker: Docker, tx: mpsc::Sender<ContainerEvent>, stop: CancellationToken) {
    loop {
        let opts = EventsOptions::<String> {
            filters: [
                ("type", ["container"].as_slice()),
                ("event", ["start", "die", "stop", "kill", "destroy"].as_slice()),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect(),
            ..Default::default()
        };
        let mut stream = docker.events(Some(opts));
        info!("watching for Docker container events");

        loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => {
                    info!("container event loop stopping");
                    return;
                }

                message = stream.next() => match message {
                    Some(Ok(message)) => {
                        if let Some(event) = message_event(&docker, message).await {
                            if tx.send(event).await.is_err() {
                                debug!("event receiver dropped, stopping watcher loop");
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        error!(error = %err, "Docker event stream error");
                        break;
                    }
                    None => {
                        warn!("Docker event stream ended");
                        break;
                    }
                }
            }
        }

        tokio::select! {
            _ = stop.cancelled() => return,
            _ = sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Convert a raw Docker event into a [`ContainerEvent`]. Start events are
/// enriched by an inspect call to recover labels and the creation instant;
/// inspect failures drop the event with a warning.
async fn message_event(docker: &Docker, message: EventMessage) -> Option<ContainerEvent> {
    let actor = message.actor?;
    let id = actor.id.unwrap_or_default();
    if id.is_empty() {
        return None;
    }
    let status = message.action.unwrap_or_default();

    if status == STATUS_START {
        match docker.inspect_container(&id, None).await {
            Ok(detail) => {
                let name = detail
                    .name
                    .as_deref()
                    .map(|name| name.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                let created = detail
                    .created
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                let labels = detail
                    .config
                    .and_then(|config| config.labels)
                    .unwrap_or_default();
                Some(ContainerEvent {
                    id,
                    name,
                    status,
                    created,
                    labels,
                })
            }
            Err(err) => {
                warn!(container_id = %id, error = %err, "failed to inspect started container");
                None
            }
        }
    } else {
        let name = actor
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get("name"))
            .cloned()
            .unwrap_or_else(|| id.clone());
        Some(ContainerEvent {
            id,
            name,
            status,
            created: None,
            labels: HashMap::new(),
        })
    }
}
