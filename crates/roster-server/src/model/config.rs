//! Configuration management for Roster server
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file,
//! `ROSTER__*` environment variables, command line arguments.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use roster_common::{
    DEFAULT_REGISTRY_SERVICE_NAME, RosterError, RosterResult, local_ip, url_host_port,
};
use tracing::warn;
use roster_registry::{LeaseConfig, PreservationConfig, RegistryConfig, ReplicationConfig};

use super::constants::*;
use crate::startup::logging::LoggingConfig;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "roster-server", version, about = "Heartbeat-based service registry")]
struct Cli {
    /// Configuration file (defaults to conf/application.yml when present)
    #[arg(short = 'c', long = "config", env = "ROSTER_CONFIG")]
    config: Option<String>,
    /// HTTP listening port
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Comma-separated peer registry URLs
    #[arg(long = "peers")]
    peers: Option<String>,
    /// Identity of this node among its peers
    #[arg(long = "node-id")]
    node_id: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

fn config_error(e: config::ConfigError) -> RosterError {
    RosterError::ConfigError(e.to_string())
}

impl Configuration {
    /// Load configuration using the process arguments
    pub fn new() -> RosterResult<Self> {
        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> RosterResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Cli::parse_from(args);

        let file = match &args.config {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        if let Some(v) = args.port {
            builder = builder
                .set_override(SERVER_PORT, i64::from(v))
                .map_err(config_error)?;
        }
        if let Some(v) = args.peers {
            builder = builder.set_override(PEERS_URLS, v).map_err(config_error)?;
        }
        if let Some(v) = args.node_id {
            builder = builder.set_override(NODE_ID, v).map_err(config_error)?;
        }

        let config = builder.build().map_err(config_error)?;
        Ok(Configuration { config })
    }

    fn get_secs(&self, key: &str, default: u64) -> Duration {
        let secs = self
            .config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default);
        Duration::from_secs(secs)
    }

    fn get_millis(&self, key: &str, default: Duration) -> Duration {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Context path with a leading slash and no trailing slash
    pub fn context_path(&self) -> String {
        let raw = self
            .config
            .get_string(SERVER_CONTEXT_PATH)
            .unwrap_or(DEFAULT_CONTEXT_PATH.to_string());
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.get_secs(SERVER_SHUTDOWN_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }

    // ========================================================================
    // Node Configuration
    // ========================================================================

    /// Node id, defaulting to `<local ip>:<port>`
    pub fn node_id(&self) -> String {
        self.config
            .get_string(NODE_ID)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{}:{}", local_ip(), self.server_port()))
    }

    pub fn node_service_name(&self) -> String {
        self.config
            .get_string(NODE_SERVICE_NAME)
            .unwrap_or(DEFAULT_REGISTRY_SERVICE_NAME.to_string())
    }

    // ========================================================================
    // Client Configuration (this node as a client of the registry)
    // ========================================================================

    pub fn register_with_registry(&self) -> bool {
        self.config
            .get_bool(CLIENT_REGISTER_WITH_REGISTRY)
            .unwrap_or(false)
    }

    pub fn fetch_registry(&self) -> bool {
        self.config.get_bool(CLIENT_FETCH_REGISTRY).unwrap_or(false)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.get_secs(CLIENT_HEARTBEAT_INTERVAL_SECS, DEFAULT_HEARTBEAT_INTERVAL_SECS)
    }

    // ========================================================================
    // Lease / Self-preservation Configuration
    // ========================================================================

    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            duration: self.get_secs(LEASE_DURATION_SECS, DEFAULT_LEASE_DURATION_SECS),
            eviction_interval: self
                .get_secs(LEASE_EVICTION_INTERVAL_SECS, DEFAULT_EVICTION_INTERVAL_SECS),
        }
    }

    pub fn preservation_config(&self) -> PreservationConfig {
        let eviction_interval = self.lease_config().eviction_interval;
        PreservationConfig {
            enabled: self
                .config
                .get_bool(SELF_PRESERVATION_ENABLED)
                .unwrap_or(true),
            renewal_percent_threshold: self
                .config
                .get_float(SELF_PRESERVATION_THRESHOLD)
                .unwrap_or(DEFAULT_RENEWAL_PERCENT_THRESHOLD),
            expected_heartbeat_interval: self.heartbeat_interval(),
            window: self.get_secs(SELF_PRESERVATION_WINDOW_SECS, eviction_interval.as_secs()),
        }
    }

    // ========================================================================
    // Replication Configuration
    // ========================================================================

    /// Peer URLs from a YAML list or a comma-separated string
    ///
    /// URLs pointing at this node's own listener are left out, so one peer
    /// list can be shared by every node of a cluster.
    pub fn peer_urls(&self) -> Vec<String> {
        let raw: Vec<String> = match self.config.get_array(PEERS_URLS) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| v.into_string().ok())
                .collect(),
            Err(_) => self
                .config
                .get_string(PEERS_URLS)
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        };
        raw.into_iter()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .filter(|v| {
                let own = self.is_own_url(v);
                if own {
                    warn!(url = %v, "Skipping peer URL that points at this node");
                }
                !own
            })
            .collect()
    }

    fn is_own_url(&self, url: &str) -> bool {
        let Some((host, port)) = url_host_port(url) else {
            return false;
        };
        if port != self.server_port() {
            return false;
        }
        let address = self.server_address();
        let ip = local_ip();
        ["localhost", "127.0.0.1", "::1", ip.as_str(), address.as_str()]
            .iter()
            .any(|own| own.eq_ignore_ascii_case(&host))
    }

    pub fn replication_config(&self) -> ReplicationConfig {
        let defaults = ReplicationConfig::default();
        ReplicationConfig {
            peers: self.peer_urls(),
            queue_capacity: self
                .config
                .get_int(REPLICATION_QUEUE_CAPACITY)
                .ok()
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.queue_capacity),
            max_retries: self
                .config
                .get_int(REPLICATION_MAX_RETRIES)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_retries),
            initial_backoff: self.get_millis(REPLICATION_INITIAL_BACKOFF_MS, defaults.initial_backoff),
            max_backoff: self.get_millis(REPLICATION_MAX_BACKOFF_MS, defaults.max_backoff),
            request_timeout: self.get_millis(REPLICATION_TIMEOUT_MS, defaults.request_timeout),
            fetch_registry: self.fetch_registry(),
            sync_interval: self.get_secs(
                REPLICATION_SYNC_INTERVAL_SECS,
                defaults.sync_interval.as_secs(),
            ),
        }
    }

    /// Typed configuration consumed by the registry crate
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            node_id: self.node_id(),
            lease: self.lease_config(),
            preservation: self.preservation_config(),
            replication: self.replication_config(),
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOGS_PATH).ok(),
            self.config.get_bool(LOGS_CONSOLE_ENABLED).unwrap_or(true),
            self.config.get_bool(LOGS_FILE_ENABLED).unwrap_or(true),
            self.config
                .get_string(LOGS_LEVEL)
                .unwrap_or(DEFAULT_LOG_LEVEL.to_string()),
        )
    }
}
