//! In-memory registry store
//!
//! Records are kept in a two-level map: service name -> instance id -> record.
//! Writers to one service only contend on that service's shard, and every
//! mutation of a single instance happens under the inner map's entry lock so
//! register, renew, evict and deregister on the same id are linearizable.
//!
//! Lock order is always outer map then inner map. Operations that may remove
//! an empty group never hold an iterator over the outer map while doing so.

use std::collections::{BTreeMap, HashSet};

use dashmap::DashMap;
use roster_common::{RosterError, RosterResult};
use tracing::{debug, info};

use crate::model::{InstanceRecord, InstanceStatus, Origin};

/// Result of a successful renewal
#[derive(Clone, Debug, PartialEq)]
pub enum Renewal {
    /// The lease deadline moved forward
    Renewed,
    /// The entry was owned by a peer; this node now owns it
    Claimed(InstanceRecord),
}

/// Concurrent registry of service instances
#[derive(Debug, Default)]
pub struct RegistryStore {
    /// Key: service name, Value: map of instance id -> record
    services: DashMap<String, DashMap<String, InstanceRecord>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance record
    ///
    /// A replaced record keeps its original registration timestamp. Returns
    /// the record as stored together with whether it replaced an existing one.
    pub fn register(&self, mut record: InstanceRecord) -> (InstanceRecord, bool) {
        // Holding the outer entry keeps a concurrent removal of the empty
        // group from dropping this insert.
        let group = self.services.entry(record.service_name.clone()).or_default();
        let replaced = match group.get(&record.instance_id) {
            Some(existing) => {
                record.registration_timestamp = existing.registration_timestamp;
                true
            }
            None => false,
        };
        group.insert(record.instance_id.clone(), record.clone());
        (record, replaced)
    }

    /// Move the lease deadline of an instance forward
    ///
    /// With `claim_ownership`, a replicated entry becomes locally owned.
    pub fn renew(
        &self,
        service_name: &str,
        instance_id: &str,
        now_ms: i64,
        claim_ownership: bool,
    ) -> RosterResult<Renewal> {
        let group = self
            .services
            .get(service_name)
            .ok_or_else(|| RosterError::not_found(service_name, instance_id))?;
        let mut record = group
            .get_mut(instance_id)
            .ok_or_else(|| RosterError::not_found(service_name, instance_id))?;

        record.last_renewal_timestamp = now_ms;

        if claim_ownership && !record.is_local() {
            let previous = std::mem::take(&mut record.origin);
            record.last_updated_timestamp = now_ms;
            info!(
                service = %service_name,
                instance = %instance_id,
                previous_owner = ?previous,
                "Claimed ownership of replicated instance"
            );
            return Ok(Renewal::Claimed(record.clone()));
        }

        Ok(Renewal::Renewed)
    }

    /// Remove an instance; `None` when it was not registered
    pub fn deregister(&self, service_name: &str, instance_id: &str) -> Option<InstanceRecord> {
        let removed = self
            .services
            .get(service_name)
            .and_then(|group| group.remove(instance_id))
            .map(|(_, record)| record);

        if removed.is_some() {
            self.remove_group_if_empty(service_name);
        }
        removed
    }

    /// Override an instance's status
    ///
    /// A DOWN instance must re-register to come back UP.
    pub fn update_status(
        &self,
        service_name: &str,
        instance_id: &str,
        status: InstanceStatus,
        now_ms: i64,
    ) -> RosterResult<InstanceRecord> {
        let group = self
            .services
            .get(service_name)
            .ok_or_else(|| RosterError::not_found(service_name, instance_id))?;
        let mut record = group
            .get_mut(instance_id)
            .ok_or_else(|| RosterError::not_found(service_name, instance_id))?;

        if record.status == InstanceStatus::Down && status == InstanceStatus::Up {
            return Err(RosterError::IllegalState(format!(
                "instance '{}' of service '{}' is DOWN and must re-register",
                instance_id, service_name
            )));
        }

        record.status = status;
        record.last_updated_timestamp = now_ms;
        Ok(record.clone())
    }

    /// Get one instance regardless of status
    pub fn get(&self, service_name: &str, instance_id: &str) -> Option<InstanceRecord> {
        self.services
            .get(service_name)
            .and_then(|group| group.get(instance_id).map(|r| r.value().clone()))
    }

    /// Instances of a service with status UP
    pub fn lookup(&self, service_name: &str) -> Vec<InstanceRecord> {
        self.services
            .get(service_name)
            .map(|group| {
                group
                    .iter()
                    .filter(|entry| entry.value().is_up())
                    .map(|entry| entry.value().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every service and all of its instances
    pub fn lookup_all(&self) -> BTreeMap<String, Vec<InstanceRecord>> {
        self.services
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| {
                let mut instances: Vec<InstanceRecord> =
                    entry.value().iter().map(|r| r.value().clone()).collect();
                instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
                (entry.key().clone(), instances)
            })
            .collect()
    }

    /// Locally owned instances whose lease has expired at `now_ms`
    pub fn expired_candidates(&self, now_ms: i64) -> Vec<(String, String)> {
        self.services
            .iter()
            .flat_map(|group| {
                group
                    .value()
                    .iter()
                    .filter(|entry| entry.is_local() && entry.lease().is_expired(now_ms))
                    .map(|entry| (entry.service_name.clone(), entry.instance_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Remove an instance if its lease is still expired at `now_ms`
    ///
    /// A renewal that landed after candidate collection keeps the instance.
    pub fn evict(&self, service_name: &str, instance_id: &str, now_ms: i64) -> Option<InstanceRecord> {
        let removed = self
            .services
            .get(service_name)
            .and_then(|group| {
                group.remove_if(instance_id, |_, record| {
                    record.is_local() && record.lease().is_expired(now_ms)
                })
            })
            .map(|(_, record)| record);

        if removed.is_some() {
            self.remove_group_if_empty(service_name);
        } else {
            debug!(
                service = %service_name,
                instance = %instance_id,
                "Eviction skipped, lease renewed or instance gone"
            );
        }
        removed
    }

    /// Merge a record owned by a peer node
    ///
    /// Applied only when not older than the stored copy. Returns whether the
    /// store changed.
    pub fn apply_remote(&self, mut record: InstanceRecord, source: &str) -> bool {
        record.origin = Origin::Replicated {
            node: source.to_string(),
        };

        let group = self.services.entry(record.service_name.clone()).or_default();
        if let Some(existing) = group.get(&record.instance_id)
            && existing.last_updated_timestamp > record.last_updated_timestamp
        {
            debug!(
                service = %record.service_name,
                instance = %record.instance_id,
                source = %source,
                "Ignored stale replicated registration"
            );
            return false;
        }
        group.insert(record.instance_id.clone(), record);
        true
    }

    /// Drop entries replicated from `owner` that its snapshot no longer holds
    ///
    /// `present` is the key set of the owner's snapshot taken at
    /// `snapshot_ms`. Entries updated after that instant are kept, since the
    /// snapshot could not have seen them. Returns the removed records.
    pub fn remove_stale_replicas(
        &self,
        owner: &str,
        present: &HashSet<(String, String)>,
        snapshot_ms: i64,
    ) -> Vec<InstanceRecord> {
        let is_stale = |record: &InstanceRecord| {
            matches!(&record.origin, Origin::Replicated { node } if node == owner)
                && record.last_updated_timestamp <= snapshot_ms
                && !present.contains(&(record.service_name.clone(), record.instance_id.clone()))
        };

        let candidates: Vec<(String, String)> = self
            .services
            .iter()
            .flat_map(|group| {
                group
                    .value()
                    .iter()
                    .filter(|entry| is_stale(entry.value()))
                    .map(|entry| (entry.service_name.clone(), entry.instance_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut removed = Vec::with_capacity(candidates.len());
        for (service_name, instance_id) in candidates {
            let record = self
                .services
                .get(&service_name)
                .and_then(|group| group.remove_if(&instance_id, |_, record| is_stale(record)))
                .map(|(_, record)| record);
            if let Some(record) = record {
                self.remove_group_if_empty(&service_name);
                removed.push(record);
            }
        }
        removed
    }

    pub fn service_count(&self) -> usize {
        self.services.iter().filter(|g| !g.value().is_empty()).count()
    }

    pub fn instance_count(&self) -> usize {
        self.services.iter().map(|g| g.value().len()).sum()
    }

    /// Number of instances whose lease this node is responsible for
    pub fn local_instance_count(&self) -> usize {
        self.services
            .iter()
            .map(|g| g.value().iter().filter(|r| r.is_local()).count())
            .sum()
    }

    fn remove_group_if_empty(&self, service_name: &str) {
        if self
            .services
            .remove_if(service_name, |_, group| group.is_empty())
            .is_some()
        {
            debug!(service = %service_name, "Removed empty service group");
        }
    }
}
