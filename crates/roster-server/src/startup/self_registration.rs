//! Registers this node in its own registry and keeps the lease alive
//!
//! Writes go through the local [`Registry`], so peers learn about the node
//! through normal replication.

use std::sync::Arc;
use std::time::Duration;

use roster_common::{RosterError, RosterResult};
use roster_registry::{InstanceRecord, InstanceRegistration, Registry, ShutdownSignal};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SelfRegistration {
    pub service_name: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub context_path: String,
    pub heartbeat_interval: Duration,
}

impl SelfRegistration {
    fn registration(&self) -> InstanceRegistration {
        InstanceRegistration::new(
            &self.service_name,
            &self.instance_id,
            &self.host,
            i64::from(self.port),
        )
        .with_metadata("contextPath", &self.context_path)
    }

    pub fn register(&self, registry: &Registry) -> RosterResult<InstanceRecord> {
        registry.register(self.registration())
    }

    /// One heartbeat; a lease lost to eviction is re-registered
    pub fn heartbeat(&self, registry: &Registry) -> RosterResult<()> {
        match registry.renew(&self.service_name, &self.instance_id) {
            Err(RosterError::NotFound { .. }) => {
                warn!(
                    service_name = %self.service_name,
                    instance_id = %self.instance_id,
                    "Own registration missing, re-registering"
                );
                self.register(registry).map(|_| ())
            }
            other => other,
        }
    }

    /// Register, heartbeat until shutdown, then deregister
    pub fn spawn(self, registry: Arc<Registry>, shutdown: &ShutdownSignal) -> JoinHandle<()> {
        let mut listener = shutdown.subscribe();
        tokio::spawn(async move {
            match self.register(&registry) {
                Ok(record) => info!(
                    service_name = %record.service_name,
                    instance_id = %record.instance_id,
                    address = %record.address(),
                    "Registered this node"
                ),
                Err(e) => warn!("Self-registration failed: {}", e),
            }

            let start = tokio::time::Instant::now() + self.heartbeat_interval;
            let mut ticker = interval_at(start, self.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.heartbeat(&registry) {
                            Ok(()) => debug!(instance_id = %self.instance_id, "Self heartbeat sent"),
                            Err(e) => warn!("Self heartbeat failed: {}", e),
                        }
                    }
                    _ = listener.cancelled() => break,
                }
            }

            if registry.deregister(&self.service_name, &self.instance_id) {
                info!(instance_id = %self.instance_id, "Deregistered this node");
            }
        })
    }
}
