//! Registry data models
//!
//! This module defines the core data structures for service discovery:
//! - Instance records and their status
//! - Lease views derived from records
//! - Registration input and its validation

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use roster_common::{RosterError, RosterResult, validation};
use serde::{Deserialize, Serialize};

/// Instance lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Starting,
    Up,
    Down,
    OutOfService,
    #[default]
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "STARTING" => Ok(InstanceStatus::Starting),
            "UP" => Ok(InstanceStatus::Up),
            "DOWN" => Ok(InstanceStatus::Down),
            "OUT_OF_SERVICE" => Ok(InstanceStatus::OutOfService),
            "UNKNOWN" => Ok(InstanceStatus::Unknown),
            other => Err(RosterError::MalformedRegistration(format!(
                "unknown instance status '{}'",
                other
            ))),
        }
    }
}

/// Which registry node owns an entry
///
/// Only the owning node evicts an entry; replicated copies follow the
/// owner's deregister events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Origin {
    #[default]
    Local,
    Replicated {
        node: String,
    },
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// One registered service instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub service_name: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub registration_timestamp: i64,
    pub last_renewal_timestamp: i64,
    pub last_updated_timestamp: i64,
    pub lease_duration_ms: i64,
    #[serde(default)]
    pub origin: Origin,
}

impl InstanceRecord {
    pub fn is_up(&self) -> bool {
        self.status == InstanceStatus::Up
    }

    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }

    /// Lease held by this record
    pub fn lease(&self) -> Lease {
        Lease {
            last_renewal_ms: self.last_renewal_timestamp,
            duration_ms: self.lease_duration_ms,
        }
    }

    /// Base URL clients use to reach this instance
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Time-bounded liveness claim of one instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lease {
    pub last_renewal_ms: i64,
    pub duration_ms: i64,
}

impl Lease {
    /// Expiry deadline = last renewal + TTL
    pub fn deadline(&self) -> i64 {
        self.last_renewal_ms.saturating_add(self.duration_ms)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_renewal_ms) > self.duration_ms
    }
}

/// All instances sharing a service name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceGroup {
    pub name: String,
    pub instances: Vec<InstanceRecord>,
}

/// Full registry contents as served to dashboards and bootstrapping peers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    /// Node that produced the snapshot
    pub node_id: String,
    /// Producer's clock when the snapshot was taken
    #[serde(default)]
    pub generated_at: i64,
    pub services: Vec<ServiceGroup>,
}

/// Register input, validated before any mutation is applied
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRegistration {
    pub service_name: String,
    pub instance_id: String,
    pub host: String,
    pub port: i64,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub lease_duration_secs: Option<u64>,
}

impl InstanceRegistration {
    pub fn new(service_name: &str, instance_id: &str, host: &str, port: i64) -> Self {
        Self {
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration_secs = Some(duration.as_secs());
        self
    }

    /// Reject registrations with missing identity or address fields
    pub fn validate(&self) -> RosterResult<()> {
        let checks = [
            ("serviceName", validation::validate_service_name(&self.service_name)),
            ("instanceId", validation::validate_instance_id(&self.instance_id)),
            ("host", validation::validate_host(&self.host)),
            ("port", validation::validate_port(self.port)),
            ("metadata", validation::validate_metadata(&self.metadata)),
        ];
        for (field, result) in checks {
            if let Err(e) = result {
                return Err(RosterError::MalformedRegistration(format!(
                    "field '{}' rejected: {}",
                    field, e.code
                )));
            }
        }
        if let Some(scheme) = self.scheme.as_deref().filter(|s| !s.trim().is_empty())
            && let Err(e) = validation::validate_scheme(scheme)
        {
            return Err(RosterError::MalformedRegistration(format!(
                "field 'scheme' rejected: {}",
                e.code
            )));
        }
        if let Some(secs) = self.lease_duration_secs
            && let Err(e) = validation::validate_lease_duration(secs)
        {
            return Err(RosterError::MalformedRegistration(format!(
                "field 'leaseDurationSecs' rejected: {}",
                e.code
            )));
        }
        Ok(())
    }

    /// Build the stored record; call after [`validate`](Self::validate)
    pub fn into_record(self, now_ms: i64, default_lease: Duration) -> InstanceRecord {
        let default_ms = i64::try_from(default_lease.as_millis()).unwrap_or(i64::MAX);
        let lease_duration_ms = self
            .lease_duration_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map_or(default_ms, |secs| secs.saturating_mul(1000));
        let scheme = self
            .scheme
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(roster_common::DEFAULT_SCHEME)
            .to_ascii_lowercase();

        InstanceRecord {
            service_name: self.service_name.trim().to_string(),
            instance_id: self.instance_id.trim().to_string(),
            host: self.host.trim().to_string(),
            port: self.port as u16,
            scheme,
            status: self.status.unwrap_or(InstanceStatus::Up),
            metadata: self.metadata,
            registration_timestamp: now_ms,
            last_renewal_timestamp: now_ms,
            last_updated_timestamp: now_ms,
            lease_duration_ms,
            origin: Origin::Local,
        }
    }
}
