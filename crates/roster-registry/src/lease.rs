//! Lease management
//!
//! Renewals move an instance's lease deadline forward. A periodic sweep
//! collects every expired, locally owned lease and evicts them as one batch,
//! unless the self-preservation monitor says the renewal rate has collapsed.

use std::sync::Arc;
use std::time::Duration;

use roster_common::RosterResult;
use tokio::time::{Instant, interval_at};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::metrics;
use crate::model::InstanceRecord;
use crate::preservation::{PreservationMode, SelfPreservationMonitor};
use crate::replication::{ReplicationEvent, Replicator};
use crate::shutdown::ShutdownSignal;
use crate::store::{RegistryStore, Renewal};

/// Lease settings
#[derive(Clone, Debug)]
pub struct LeaseConfig {
    /// TTL applied when a registration does not carry its own
    pub duration: Duration,
    /// Time between eviction sweeps
    pub eviction_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(90),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

/// Outcome of one eviction sweep
#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    pub mode: PreservationMode,
    /// Expired leases found by this sweep
    pub candidates: usize,
    pub evicted: Vec<InstanceRecord>,
    /// Expired leases kept because of self-preservation
    pub suppressed: usize,
}

pub struct LeaseManager {
    config: LeaseConfig,
    store: Arc<RegistryStore>,
    monitor: Arc<SelfPreservationMonitor>,
    replicator: Arc<Replicator>,
    clock: Arc<dyn Clock>,
}

impl LeaseManager {
    pub fn new(
        config: LeaseConfig,
        store: Arc<RegistryStore>,
        monitor: Arc<SelfPreservationMonitor>,
        replicator: Arc<Replicator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            monitor,
            replicator,
            clock,
        }
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Renew a lease on behalf of a client heartbeat
    ///
    /// Fails with `NotFound` when the instance was evicted or never
    /// registered; the client must re-register.
    pub fn renew(&self, service_name: &str, instance_id: &str) -> RosterResult<Renewal> {
        let renewal = self
            .store
            .renew(service_name, instance_id, self.clock.now_millis(), true)?;
        self.monitor.record_heartbeat();
        Ok(renewal)
    }

    /// Run one eviction pass
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now_millis();
        let mode = self.monitor.evaluate();
        let candidates = self.store.expired_candidates(now);

        let mut report = SweepReport {
            mode,
            candidates: candidates.len(),
            ..Default::default()
        };

        if !candidates.is_empty() {
            if mode == PreservationMode::SelfPreservation {
                warn!(
                    expired = candidates.len(),
                    "Self-preservation active, skipping eviction of expired instances"
                );
                report.suppressed = candidates.len();
            } else {
                for (service_name, instance_id) in candidates {
                    if let Some(record) = self.store.evict(&service_name, &instance_id, now) {
                        info!(
                            service = %service_name,
                            instance = %instance_id,
                            last_renewal = record.last_renewal_timestamp,
                            lease_ms = record.lease_duration_ms,
                            "Evicted expired instance"
                        );
                        self.replicator.replicate(ReplicationEvent::Deregister {
                            service_name,
                            instance_id,
                        });
                        report.evicted.push(record);
                    }
                }
                if !report.evicted.is_empty() {
                    info!("Evicted {} expired instances", report.evicted.len());
                }
            }
        }

        metrics::record_evictions(report.evicted.len(), report.suppressed);
        metrics::set_registry_size(self.store.service_count(), self.store.instance_count());
        report
    }

    /// Sweep every `eviction_interval` until shutdown
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        let period = self.config.eviction_interval;
        // Trail the heartbeat window ticker so each sweep judges the window
        // that just closed
        let mut ticker = interval_at(Instant::now() + period + period / 10, period);
        let mut listener = shutdown.subscribe();

        info!(interval = ?period, ttl = ?self.config.duration, "Eviction task started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = listener.cancelled() => {
                    info!("Eviction task stopped");
                    break;
                }
            }
        }
    }
}
