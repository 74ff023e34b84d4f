//! docker-dns-sync - keeps DNS records in a shared registry in step with
//! the intents declared by Docker containers.
//!
//! Containers declare, via labels, that they wish to publish A or CNAME
//! records. This crate observes the container lifecycle, materializes
//! those declarations as record intents, resolves conflicts among them,
//! and reconciles the resulting desired set against the records the
//! registry currently holds for this instance.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        docker-dns-sync                         │
//! │                                                                │
//! │  ┌────────────────┐  events   ┌──────────────────┐            │
//! │  │ DockerWatcher  │──────────▶│   StateTracker   │            │
//! │  │ (event stream) │           │  (desired state) │            │
//! │  └────────────────┘           └────────┬─────────┘            │
//! │                                        │ snapshot             │
//! │                               ┌────────▼─────────┐            │
//! │                tick, under    │ filter + plan    │            │
//! │                global lock    │ (reconcile)      │            │
//! │                               └────────┬─────────┘            │
//! │                                        │ add/remove           │
//! │                               ┌────────▼─────────┐            │
//! │                               │  RecordRegistry  │            │
//! │                               └──────────────────┘            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conflicts are resolved by a multi-rule ownership-and-age policy: a
//! `force` label beats age, otherwise the older container wins, a CNAME
//! must outrank every A record sharing its name, and every eviction is
//! committed only if the record replacing it validates against the
//! simulated post-eviction registry state.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use docker_dns_sync::registry::MemoryRegistry;
//! use docker_dns_sync::watcher::DockerWatcher;
//! use docker_dns_sync::{SyncConfig, SyncEngine};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = SyncConfig {
//!         hostname: "my-host".to_string(),
//!         poll_interval: 5,
//!         label_prefix: "dns".to_string(),
//!         host_ip: "192.168.1.10".parse().unwrap(),
//!     };
//!
//!     let watcher = Arc::new(DockerWatcher::connect().unwrap());
//!     let registry = Arc::new(MemoryRegistry::new(cfg.hostname.clone()));
//!
//!     let shutdown = CancellationToken::new();
//!     let engine = SyncEngine::new(cfg, watcher, registry);
//!     engine.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod record;
pub mod record_map;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod telemetry;
pub mod validate;
pub mod watcher;

// Re-export main types
pub use config::{Config, SyncConfig, TelemetryConfig};
pub use engine::SyncEngine;
pub use error::{RecordValidationError, SyncError};
pub use record::{Record, RecordIntent, RecordKind};
pub use state::StateTracker;
