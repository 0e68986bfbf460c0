//! Peer replication
//!
//! Every local mutation is turned into a [`ReplicationEvent`] and pushed onto
//! one bounded queue per peer. A worker per peer drains its queue in order,
//! retrying failed sends with jittered exponential backoff. Enqueueing never
//! waits: a full queue drops the event.
//!
//! Events lost that way are repaired by a periodic sync that pulls every
//! peer's registry, merges it and drops replicas their owner no longer holds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use roster_common::error::INSTANCE_NOT_FOUND;
use roster_common::{RosterError, RosterResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::model::{InstanceRecord, InstanceStatus, Origin, RegistrySnapshot};
use crate::shutdown::{ShutdownListener, ShutdownSignal};
use crate::store::RegistryStore;

/// Path of the peer replication endpoint, relative to the context path
pub const REPLICATE_PATH: &str = "/v1/peers/replicate";

/// Path of the full registry snapshot, relative to the context path
pub const APPS_PATH: &str = "/v1/apps";

/// A registry mutation forwarded to peers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReplicationEvent {
    Register {
        record: InstanceRecord,
    },
    Renew {
        service_name: String,
        instance_id: String,
    },
    Deregister {
        service_name: String,
        instance_id: String,
    },
    StatusUpdate {
        service_name: String,
        instance_id: String,
        status: InstanceStatus,
    },
}

impl ReplicationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationEvent::Register { .. } => "register",
            ReplicationEvent::Renew { .. } => "renew",
            ReplicationEvent::Deregister { .. } => "deregister",
            ReplicationEvent::StatusUpdate { .. } => "status",
        }
    }

    pub fn key(&self) -> (&str, &str) {
        match self {
            ReplicationEvent::Register { record } => {
                (record.service_name.as_str(), record.instance_id.as_str())
            }
            ReplicationEvent::Renew {
                service_name,
                instance_id,
            }
            | ReplicationEvent::Deregister {
                service_name,
                instance_id,
            }
            | ReplicationEvent::StatusUpdate {
                service_name,
                instance_id,
                ..
            } => (service_name.as_str(), instance_id.as_str()),
        }
    }
}

/// Wire envelope of a replicated event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationMessage {
    /// Node id of the sender
    pub source: String,
    pub event: ReplicationEvent,
}

/// How a peer answered a replicated event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerAck {
    Applied,
    /// The peer does not know the instance the event refers to
    NotFound,
}

/// Replication settings
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Base URLs of peer registry nodes
    pub peers: Vec<String>,
    /// Bound of each per-peer queue
    pub queue_capacity: usize,
    /// Retries after the first failed send
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Timeout of a single peer request
    pub request_timeout: Duration,
    /// Pull peers' registries at startup
    pub fetch_registry: bool,
    /// Time between reconciliations with every peer's registry
    pub sync_interval: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            queue_capacity: 10_000,
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
            fetch_registry: false,
            sync_interval: Duration::from_secs(60),
        }
    }
}

/// Transport used to talk to peer registry nodes
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Deliver one replicated event to `peer`
    async fn replicate(&self, peer: &str, message: &ReplicationMessage) -> RosterResult<PeerAck>;

    /// Fetch the full registry of `peer`
    async fn fetch_snapshot(&self, peer: &str) -> RosterResult<RegistrySnapshot>;
}

/// Response envelope returned by peer nodes
#[derive(Debug, Deserialize)]
struct PeerResponse<T> {
    code: i32,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// [`PeerClient`] over HTTP
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    client: reqwest::Client,
    context_path: String,
}

impl HttpPeerClient {
    pub fn new(context_path: &str, request_timeout: Duration) -> RosterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RosterError::ConfigError(format!("failed to build peer client: {}", e)))?;
        Ok(Self {
            client,
            context_path: context_path.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, peer: &str, path: &str) -> String {
        format!("{}{}{}", peer.trim_end_matches('/'), self.context_path, path)
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn replicate(&self, peer: &str, message: &ReplicationMessage) -> RosterResult<PeerAck> {
        let response = self
            .client
            .post(self.url(peer, REPLICATE_PATH))
            .json(message)
            .send()
            .await
            .map_err(|e| RosterError::replication(peer, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(PeerAck::Applied);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND && is_instance_not_found(&body) {
            return Ok(PeerAck::NotFound);
        }
        Err(RosterError::replication(
            peer,
            format!("peer answered {}: {}", status, body),
        ))
    }

    async fn fetch_snapshot(&self, peer: &str) -> RosterResult<RegistrySnapshot> {
        let response = self
            .client
            .get(self.url(peer, APPS_PATH))
            .send()
            .await
            .map_err(|e| RosterError::replication(peer, e.to_string()))?;

        if !response.status().is_success() {
            return Err(RosterError::replication(
                peer,
                format!("snapshot request answered {}", response.status()),
            ));
        }

        let body: PeerResponse<RegistrySnapshot> = response
            .json()
            .await
            .map_err(|e| RosterError::replication(peer, format!("invalid snapshot: {}", e)))?;
        if body.code != 0 {
            return Err(RosterError::replication(peer, body.message));
        }
        body.data
            .ok_or_else(|| RosterError::replication(peer, "snapshot response without data"))
    }
}

/// Whether a 404 body is the peer saying it lacks the instance
///
/// Any other 404, such as an unknown route behind a wrong context path, is a
/// delivery failure.
fn is_instance_not_found(body: &str) -> bool {
    serde_json::from_str::<PeerResponse<serde_json::Value>>(body)
        .is_ok_and(|response| response.code == INSTANCE_NOT_FOUND.code)
}

/// Outcome of pulling peer registries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records merged into the local store
    pub merged: usize,
    /// Replicas dropped because their owner no longer holds them
    pub removed: usize,
}

struct PeerQueue {
    peer: String,
    sender: mpsc::Sender<ReplicationEvent>,
}

/// Fans local mutations out to peer nodes
pub struct Replicator {
    node_id: String,
    config: ReplicationConfig,
    client: Arc<dyn PeerClient>,
    store: Arc<RegistryStore>,
    queues: Vec<PeerQueue>,
    receivers: Mutex<Vec<(String, mpsc::Receiver<ReplicationEvent>)>>,
}

impl Replicator {
    pub fn new(
        node_id: &str,
        config: ReplicationConfig,
        client: Arc<dyn PeerClient>,
        store: Arc<RegistryStore>,
    ) -> Self {
        let capacity = config.queue_capacity.max(1);
        let mut queues = Vec::with_capacity(config.peers.len());
        let mut receivers = Vec::with_capacity(config.peers.len());
        for peer in &config.peers {
            let (sender, receiver) = mpsc::channel(capacity);
            queues.push(PeerQueue {
                peer: peer.clone(),
                sender,
            });
            receivers.push((peer.clone(), receiver));
        }

        Self {
            node_id: node_id.to_string(),
            config,
            client,
            store,
            queues,
            receivers: Mutex::new(receivers),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.queues.iter().map(|q| q.peer.as_str())
    }

    /// Queue an event for every peer without waiting
    pub fn replicate(&self, event: ReplicationEvent) {
        for queue in &self.queues {
            match queue.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    let (service_name, instance_id) = dropped.key();
                    warn!(
                        peer = %queue.peer,
                        kind = dropped.kind(),
                        service = %service_name,
                        instance = %instance_id,
                        "Replication queue full, dropping event"
                    );
                    metrics::record_replication(&queue.peer, "dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(peer = %queue.peer, "Replication worker stopped, event discarded");
                }
            }
        }
    }

    /// Events waiting in each peer's queue
    pub fn pending(&self) -> Vec<(String, usize)> {
        self.queues
            .iter()
            .map(|q| {
                (
                    q.peer.clone(),
                    q.sender.max_capacity() - q.sender.capacity(),
                )
            })
            .collect()
    }

    /// Spawn one delivery worker per peer
    ///
    /// Workers can only be started once; later calls return no handles.
    pub fn start(self: &Arc<Self>, shutdown: &ShutdownSignal) -> Vec<JoinHandle<()>> {
        let receivers = std::mem::take(&mut *self.receivers.lock());
        receivers
            .into_iter()
            .map(|(peer, receiver)| {
                let replicator = self.clone();
                let listener = shutdown.subscribe();
                tokio::spawn(async move { replicator.run_worker(peer, receiver, listener).await })
            })
            .collect()
    }

    async fn run_worker(
        self: Arc<Self>,
        peer: String,
        mut receiver: mpsc::Receiver<ReplicationEvent>,
        mut listener: ShutdownListener,
    ) {
        info!(peer = %peer, "Replication worker started");
        loop {
            tokio::select! {
                next = receiver.recv() => match next {
                    Some(event) => {
                        if !self.deliver(&peer, event, &mut listener).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = listener.cancelled() => break,
            }
        }
        info!(peer = %peer, "Replication worker stopped");
    }

    /// Send one event to a peer, retrying with backoff
    ///
    /// Returns false when shutdown interrupted the delivery.
    async fn deliver(
        &self,
        peer: &str,
        event: ReplicationEvent,
        listener: &mut ShutdownListener,
    ) -> bool {
        let mut message = ReplicationMessage {
            source: self.node_id.clone(),
            event,
        };
        let mut failures = 0u32;
        let mut backoff = self.config.initial_backoff;

        loop {
            match self.client.replicate(peer, &message).await {
                Ok(PeerAck::Applied) => {
                    metrics::record_replication(peer, "sent");
                    return true;
                }
                Ok(PeerAck::NotFound) => match self.registration_for(&message.event) {
                    Some(register) => {
                        let (service_name, instance_id) = message.event.key();
                        debug!(
                            peer = %peer,
                            service = %service_name,
                            instance = %instance_id,
                            "Peer missed registration, re-sending it"
                        );
                        message.event = register;
                        continue;
                    }
                    None => {
                        // Nothing left to repair on the peer
                        metrics::record_replication(peer, "sent");
                        return true;
                    }
                },
                Err(e) => {
                    failures += 1;
                    metrics::record_replication(peer, "failed");
                    if failures > self.config.max_retries {
                        error!(
                            peer = %peer,
                            kind = message.event.kind(),
                            error = %e,
                            "Replication failed after max retries, dropping event"
                        );
                        metrics::record_replication(peer, "dropped");
                        return true;
                    }

                    let delay = jittered(backoff);
                    warn!(
                        peer = %peer,
                        kind = message.event.kind(),
                        error = %e,
                        retry = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Replication failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = listener.cancelled() => return false,
                    }
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
            }
        }
    }

    /// Full registration to repair a peer that answered NotFound
    fn registration_for(&self, event: &ReplicationEvent) -> Option<ReplicationEvent> {
        match event {
            ReplicationEvent::Renew {
                service_name,
                instance_id,
            }
            | ReplicationEvent::StatusUpdate {
                service_name,
                instance_id,
                ..
            } => self
                .store
                .get(service_name, instance_id)
                .filter(|record| record.is_local())
                .map(|record| ReplicationEvent::Register { record }),
            ReplicationEvent::Register { .. } | ReplicationEvent::Deregister { .. } => None,
        }
    }

    /// Merge every peer's registry into the local store
    ///
    /// Replicas owned by a peer but missing from its registry are dropped.
    /// Unreachable peers are logged and skipped.
    pub async fn sync_from_peers(&self) -> SyncReport {
        let mut total = SyncReport::default();
        for queue in &self.queues {
            match self.client.fetch_snapshot(&queue.peer).await {
                Ok(snapshot) => {
                    let report = self.merge_snapshot(snapshot);
                    if report != SyncReport::default() {
                        info!(
                            peer = %queue.peer,
                            merged = report.merged,
                            removed = report.removed,
                            "Synced registry from peer"
                        );
                    }
                    total.merged += report.merged;
                    total.removed += report.removed;
                }
                Err(e) => {
                    warn!(peer = %queue.peer, error = %e, "Failed to fetch registry from peer");
                }
            }
        }
        total
    }

    fn merge_snapshot(&self, snapshot: RegistrySnapshot) -> SyncReport {
        let mut report = SyncReport::default();
        if snapshot.node_id == self.node_id {
            warn!(node_id = %self.node_id, "Peer list points at this node, ignoring its registry");
            return report;
        }

        let mut present = HashSet::new();
        for record in snapshot
            .services
            .into_iter()
            .flat_map(|group| group.instances)
        {
            let owner = match &record.origin {
                Origin::Local => snapshot.node_id.clone(),
                Origin::Replicated { node } => node.clone(),
            };
            if owner == self.node_id {
                continue;
            }
            if owner == snapshot.node_id {
                present.insert((record.service_name.clone(), record.instance_id.clone()));
            }
            if self.store.apply_remote(record, &owner) {
                report.merged += 1;
            }
        }

        let removed =
            self.store
                .remove_stale_replicas(&snapshot.node_id, &present, snapshot.generated_at);
        for record in &removed {
            info!(
                owner = %snapshot.node_id,
                service = %record.service_name,
                instance = %record.instance_id,
                "Dropped replica its owner no longer holds"
            );
        }
        report.removed = removed.len();
        report
    }

    /// Sync with every peer each `sync_interval` until shutdown
    pub async fn run_sync(self: Arc<Self>, shutdown: ShutdownSignal) {
        let period = self.config.sync_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        let mut listener = shutdown.subscribe();

        info!(interval = ?period, "Peer sync task started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sync_from_peers().await;
                }
                _ = listener.cancelled() => {
                    info!("Peer sync task stopped");
                    break;
                }
            }
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let factor = rand::rng().random_range(0.5..=1.0);
    base.mul_f64(factor)
}
