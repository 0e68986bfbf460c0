//! Request models for the registry HTTP API

use std::collections::HashMap;

use roster_common::{DEFAULT_SCHEME, impl_or_default};
use roster_registry::{InstanceRegistration, InstanceStatus};
use serde::{Deserialize, Serialize};

/// Path of a single instance: `/v1/apps/{service}/{id}`
#[derive(Clone, Debug, Deserialize)]
pub struct InstancePath {
    pub service: String,
    pub id: String,
}

/// Register body; the service name comes from the path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    /// Defaults to `<host>:<service>:<port>`
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub lease_duration_secs: Option<u64>,
}

impl RegisterBody {
    impl_or_default!(pub, scheme_or_default, scheme, DEFAULT_SCHEME);

    pub fn into_registration(self, service_name: &str, port: i64) -> InstanceRegistration {
        let instance_id = self
            .instance_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}:{}", self.host.trim(), service_name, port));

        InstanceRegistration {
            service_name: service_name.to_string(),
            instance_id,
            scheme: Some(self.scheme_or_default().to_string()),
            host: self.host,
            port,
            status: self.status,
            metadata: self.metadata,
            lease_duration_secs: self.lease_duration_secs,
        }
    }
}

/// `?value=` of the status override endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub value: Option<String>,
}

impl StatusQuery {
    impl_or_default!(pub, value_or_default, value, "");
}
