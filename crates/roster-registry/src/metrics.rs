// Registry metrics
// Counters and gauges for registry mutations, eviction and replication

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::preservation::{HeartbeatWindow, PreservationMode};

/// Register descriptions of all registry metrics
/// Should be called once after a recorder is installed
pub fn describe_metrics() {
    // Registry operations
    describe_counter!(
        "roster_registrations_total",
        "Total number of instance registrations"
    );
    describe_counter!("roster_renewals_total", "Total number of lease renewals");
    describe_counter!(
        "roster_deregistrations_total",
        "Total number of instance deregistrations"
    );
    describe_gauge!("roster_instances", "Number of registered instances");
    describe_gauge!("roster_services", "Number of registered services");

    // Eviction
    describe_counter!("roster_evictions_total", "Total number of evicted instances");
    describe_counter!(
        "roster_evictions_suppressed_total",
        "Expired instances kept because self-preservation was active"
    );
    describe_gauge!(
        "roster_self_preservation",
        "1 while self-preservation mode is active"
    );
    describe_gauge!(
        "roster_heartbeats_expected",
        "Expected heartbeats in the last closed window"
    );
    describe_gauge!(
        "roster_heartbeats_actual",
        "Received heartbeats in the last closed window"
    );

    // Replication
    describe_counter!(
        "roster_replication_sent_total",
        "Replication events delivered to peers"
    );
    describe_counter!(
        "roster_replication_failed_total",
        "Replication sends that failed and were retried or dropped"
    );
    describe_counter!(
        "roster_replication_dropped_total",
        "Replication events dropped because a queue was full or retries ran out"
    );
}

/// Record a registry operation (register / renew / deregister)
pub fn record_operation(operation: &str, replicated: bool) {
    let name = match operation {
        "register" => "roster_registrations_total",
        "renew" => "roster_renewals_total",
        _ => "roster_deregistrations_total",
    };
    counter!(name, "replicated" => replicated.to_string()).increment(1);
}

/// Update instance/service gauges
pub fn set_registry_size(services: usize, instances: usize) {
    gauge!("roster_services").set(services as f64);
    gauge!("roster_instances").set(instances as f64);
}

pub fn record_evictions(evicted: usize, suppressed: usize) {
    counter!("roster_evictions_total").increment(evicted as u64);
    counter!("roster_evictions_suppressed_total").increment(suppressed as u64);
}

pub fn record_preservation_mode(mode: PreservationMode) {
    let value = match mode {
        PreservationMode::Normal => 0.0,
        PreservationMode::SelfPreservation => 1.0,
    };
    gauge!("roster_self_preservation").set(value);
}

pub fn record_heartbeat_window(window: &HeartbeatWindow) {
    gauge!("roster_heartbeats_expected").set(window.expected);
    gauge!("roster_heartbeats_actual").set(window.actual as f64);
}

/// Record the outcome of one replication send
pub fn record_replication(peer: &str, outcome: &'static str) {
    let name = match outcome {
        "sent" => "roster_replication_sent_total",
        "failed" => "roster_replication_failed_total",
        _ => "roster_replication_dropped_total",
    };
    counter!(name, "peer" => peer.to_string()).increment(1);
}
