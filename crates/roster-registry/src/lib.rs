//! Roster Registry - service registry core
//!
//! This crate holds everything that decides which instances are discoverable:
//! - `store`: concurrent service name -> instance map
//! - `lease`: heartbeat renewal and batched eviction sweeps
//! - `preservation`: self-preservation monitor guarding eviction
//! - `replication`: asynchronous fan-out of mutations to peer nodes
//! - `registry`: facade combining the above

pub mod clock;
pub mod lease;
pub mod metrics;
pub mod model;
pub mod preservation;
pub mod registry;
pub mod replication;
pub mod shutdown;
pub mod store;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use lease::{LeaseConfig, LeaseManager, SweepReport};
pub use model::{
    InstanceRecord, InstanceRegistration, InstanceStatus, Lease, Origin, RegistrySnapshot,
    ServiceGroup,
};
pub use preservation::{
    HeartbeatWindow, PreservationConfig, PreservationMode, PreservationStats,
    SelfPreservationMonitor,
};
pub use registry::{Registry, RegistryConfig, RegistryOverview};
pub use replication::{
    HttpPeerClient, PeerAck, PeerClient, ReplicationConfig, ReplicationEvent, ReplicationMessage,
    Replicator, SyncReport,
};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use store::{RegistryStore, Renewal};
