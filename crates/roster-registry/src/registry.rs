//! Registry facade
//!
//! Owns the store, the lease manager, the self-preservation monitor and the
//! replicator, and is the single entry point used by the HTTP layer. Local
//! mutations are replicated; mutations received from peers are not.

use std::collections::BTreeMap;
use std::sync::Arc;

use roster_common::{RosterError, RosterResult};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::lease::{LeaseConfig, LeaseManager, SweepReport};
use crate::metrics;
use crate::model::{
    InstanceRecord, InstanceRegistration, InstanceStatus, RegistrySnapshot, ServiceGroup,
};
use crate::preservation::{PreservationConfig, PreservationStats, SelfPreservationMonitor};
use crate::replication::{
    PeerClient, ReplicationConfig, ReplicationEvent, ReplicationMessage, Replicator,
};
use crate::shutdown::ShutdownSignal;
use crate::store::{RegistryStore, Renewal};

/// Typed registry configuration
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Identity of this node in replication messages
    pub node_id: String,
    pub lease: LeaseConfig,
    pub preservation: PreservationConfig,
    pub replication: ReplicationConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            node_id: format!("roster-{}", uuid::Uuid::new_v4()),
            lease: LeaseConfig::default(),
            preservation: PreservationConfig::default(),
            replication: ReplicationConfig::default(),
        }
    }
}

/// Registry state summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryOverview {
    pub node_id: String,
    pub services: usize,
    pub instances: usize,
    pub local_instances: usize,
    pub replicated_instances: usize,
    pub preservation: PreservationStats,
    /// Events waiting per peer
    pub pending_replication: BTreeMap<String, usize>,
}

pub struct Registry {
    node_id: String,
    clock: Arc<dyn Clock>,
    store: Arc<RegistryStore>,
    monitor: Arc<SelfPreservationMonitor>,
    leases: Arc<LeaseManager>,
    replicator: Arc<Replicator>,
    fetch_registry: bool,
}

impl Registry {
    pub fn new(config: RegistryConfig, peer_client: Arc<dyn PeerClient>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), peer_client)
    }

    pub fn with_clock(
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
        peer_client: Arc<dyn PeerClient>,
    ) -> Self {
        let store = Arc::new(RegistryStore::new());
        let monitor = Arc::new(SelfPreservationMonitor::new(
            config.preservation,
            store.clone(),
            clock.clone(),
        ));
        let fetch_registry = config.replication.fetch_registry;
        let replicator = Arc::new(Replicator::new(
            &config.node_id,
            config.replication,
            peer_client,
            store.clone(),
        ));
        let leases = Arc::new(LeaseManager::new(
            config.lease,
            store.clone(),
            monitor.clone(),
            replicator.clone(),
            clock.clone(),
        ));

        Self {
            node_id: config.node_id,
            clock,
            store,
            monitor,
            leases,
            replicator,
            fetch_registry,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<SelfPreservationMonitor> {
        &self.monitor
    }

    pub fn lease_manager(&self) -> &Arc<LeaseManager> {
        &self.leases
    }

    /// Register or re-register an instance
    pub fn register(&self, registration: InstanceRegistration) -> RosterResult<InstanceRecord> {
        registration.validate()?;

        let record = registration.into_record(self.clock.now_millis(), self.leases.config().duration);
        let (record, replaced) = self.store.register(record);
        self.monitor.record_heartbeat();

        info!(
            service = %record.service_name,
            instance = %record.instance_id,
            address = %record.address(),
            status = %record.status,
            replaced,
            "Registered instance"
        );
        metrics::record_operation("register", false);
        self.replicator.replicate(ReplicationEvent::Register {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Heartbeat from a client
    pub fn renew(&self, service_name: &str, instance_id: &str) -> RosterResult<()> {
        let renewal = self.leases.renew(service_name, instance_id)?;
        debug!(service = %service_name, instance = %instance_id, "Renewed lease");
        metrics::record_operation("renew", false);

        let event = match renewal {
            Renewal::Renewed => ReplicationEvent::Renew {
                service_name: service_name.to_string(),
                instance_id: instance_id.to_string(),
            },
            // Peers must learn the new owner
            Renewal::Claimed(record) => ReplicationEvent::Register { record },
        };
        self.replicator.replicate(event);
        Ok(())
    }

    /// Remove an instance; returns whether it was registered
    pub fn deregister(&self, service_name: &str, instance_id: &str) -> bool {
        let removed = self.store.deregister(service_name, instance_id).is_some();
        if removed {
            info!(service = %service_name, instance = %instance_id, "Deregistered instance");
            metrics::record_operation("deregister", false);
        } else {
            debug!(
                service = %service_name,
                instance = %instance_id,
                "Deregister of unknown instance"
            );
        }
        // Replicate even when absent here so peers converge
        self.replicator.replicate(ReplicationEvent::Deregister {
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
        });
        removed
    }

    /// Override an instance's status
    pub fn update_status(
        &self,
        service_name: &str,
        instance_id: &str,
        status: InstanceStatus,
    ) -> RosterResult<InstanceRecord> {
        let record =
            self.store
                .update_status(service_name, instance_id, status, self.clock.now_millis())?;
        info!(
            service = %service_name,
            instance = %instance_id,
            status = %status,
            "Updated instance status"
        );
        self.replicator.replicate(ReplicationEvent::StatusUpdate {
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
            status,
        });
        Ok(record)
    }

    pub fn get_instance(&self, service_name: &str, instance_id: &str) -> RosterResult<InstanceRecord> {
        self.store
            .get(service_name, instance_id)
            .ok_or_else(|| RosterError::not_found(service_name, instance_id))
    }

    /// UP instances of a service
    pub fn lookup(&self, service_name: &str) -> ServiceGroup {
        ServiceGroup {
            name: service_name.to_string(),
            instances: self.store.lookup(service_name),
        }
    }

    /// Every service with all of its instances
    pub fn lookup_all(&self) -> BTreeMap<String, Vec<InstanceRecord>> {
        self.store.lookup_all()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            node_id: self.node_id.clone(),
            generated_at: self.clock.now_millis(),
            services: self
                .store
                .lookup_all()
                .into_iter()
                .map(|(name, instances)| ServiceGroup { name, instances })
                .collect(),
        }
    }

    /// Apply an event received from a peer without forwarding it
    pub fn apply_replicated(&self, message: ReplicationMessage) -> RosterResult<()> {
        if message.source == self.node_id {
            return Err(RosterError::IllegalState(format!(
                "replicated event carries this node's own id '{}'",
                self.node_id
            )));
        }

        let ReplicationMessage { source, event } = message;
        let kind = event.kind();
        match event {
            ReplicationEvent::Register { record } => {
                if self.store.apply_remote(record, &source) {
                    metrics::record_operation("register", true);
                }
            }
            ReplicationEvent::Renew {
                service_name,
                instance_id,
            } => {
                self.store
                    .renew(&service_name, &instance_id, self.clock.now_millis(), false)?;
                metrics::record_operation("renew", true);
            }
            ReplicationEvent::Deregister {
                service_name,
                instance_id,
            } => {
                if self.store.deregister(&service_name, &instance_id).is_some() {
                    metrics::record_operation("deregister", true);
                }
            }
            ReplicationEvent::StatusUpdate {
                service_name,
                instance_id,
                status,
            } => {
                self.store
                    .update_status(&service_name, &instance_id, status, self.clock.now_millis())?;
            }
        }
        debug!(source = %source, kind, "Applied replicated event");
        Ok(())
    }

    /// Run one eviction sweep now
    pub fn sweep(&self) -> SweepReport {
        self.leases.sweep()
    }

    pub fn overview(&self) -> RegistryOverview {
        let instances = self.store.instance_count();
        let local_instances = self.store.local_instance_count();
        RegistryOverview {
            node_id: self.node_id.clone(),
            services: self.store.service_count(),
            instances,
            local_instances,
            replicated_instances: instances.saturating_sub(local_instances),
            preservation: self.monitor.stats(),
            pending_replication: self.replicator.pending().into_iter().collect(),
        }
    }

    /// Bootstrap from peers when configured, then spawn the background tasks
    ///
    /// Spawns the eviction sweep, the heartbeat stats task, and with peers
    /// configured one replication worker per peer plus the peer sync task.
    /// All of them stop on `shutdown`.
    pub async fn start(&self, shutdown: &ShutdownSignal) -> Vec<JoinHandle<()>> {
        if self.fetch_registry {
            let report = self.replicator.sync_from_peers().await;
            info!(merged = report.merged, "Registry bootstrap from peers finished");
        }

        let mut handles = self.replicator.start(shutdown);
        if !handles.is_empty() {
            handles.push(tokio::spawn(self.replicator.clone().run_sync(shutdown.clone())));
        }
        handles.push(tokio::spawn(self.leases.clone().run(shutdown.clone())));
        handles.push(tokio::spawn(self.monitor.clone().run(shutdown.clone())));
        info!(
            node_id = %self.node_id,
            peers = self.replicator.peers().count(),
            "Registry started"
        );
        handles
    }
}
