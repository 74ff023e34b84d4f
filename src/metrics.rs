//! Metrics instrumentation for docker-dns-sync.
//!
//! All metrics are prefixed with `dns_sync.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a container lifecycle event by its runtime action string.
pub fn record_container_event(action: &str) {
    counter!("dns_sync.container.event.count", "action" => action.to_string()).increment(1);
}

/// Outcome of one reconciliation tick, for metrics.
#[derive(Debug, Clone, Copy)]
pub enum TickOutcome {
    /// The tick ran to completion under the lock.
    Success,
    /// The tick failed (lock acquisition or registry listing).
    Failed,
}

/// Record a reconciliation tick and its duration.
pub fn record_tick(outcome: TickOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        TickOutcome::Success => "success",
        TickOutcome::Failed => "failed",
    };

    counter!("dns_sync.tick.count", "outcome" => outcome_str).increment(1);
    histogram!("dns_sync.tick.duration.seconds").record(duration.as_secs_f64());
}

/// Record how many records a tick actually applied.
pub fn record_plan_applied(added: usize, removed: usize) {
    counter!("dns_sync.records.added.count").increment(added as u64);
    counter!("dns_sync.records.removed.count").increment(removed as u64);
}

/// Record a per-record apply failure (`op` is "register" or "remove").
pub fn record_apply_error(op: &str) {
    counter!("dns_sync.records.apply_error.count", "op" => op.to_string()).increment(1);
}

/// Record state tracker counts (call after each tick).
pub fn record_state_counts(running_containers: usize, desired_intents: usize) {
    gauge!("dns_sync.state.containers.running").set(running_containers as f64);
    gauge!("dns_sync.state.intents.count").set(desired_intents as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
