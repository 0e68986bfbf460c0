// Configuration keys and defaults

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const ENV_PREFIX: &str = "ROSTER";
pub const ENV_SEPARATOR: &str = "__";

pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_PORT: &str = "server.port";
pub const SERVER_CONTEXT_PATH: &str = "roster.server.context_path";
pub const SERVER_SHUTDOWN_TIMEOUT_SECS: &str = "roster.server.shutdown_timeout_secs";

pub const NODE_ID: &str = "roster.node.id";
pub const NODE_SERVICE_NAME: &str = "roster.node.service_name";

pub const CLIENT_REGISTER_WITH_REGISTRY: &str = "roster.client.register_with_registry";
pub const CLIENT_FETCH_REGISTRY: &str = "roster.client.fetch_registry";
pub const CLIENT_HEARTBEAT_INTERVAL_SECS: &str = "roster.client.heartbeat_interval_secs";

pub const LEASE_DURATION_SECS: &str = "roster.lease.duration_secs";
pub const LEASE_EVICTION_INTERVAL_SECS: &str = "roster.lease.eviction_interval_secs";

pub const SELF_PRESERVATION_ENABLED: &str = "roster.self_preservation.enabled";
pub const SELF_PRESERVATION_THRESHOLD: &str = "roster.self_preservation.renewal_percent_threshold";
pub const SELF_PRESERVATION_WINDOW_SECS: &str = "roster.self_preservation.window_secs";

pub const PEERS_URLS: &str = "roster.peers.urls";

pub const REPLICATION_QUEUE_CAPACITY: &str = "roster.replication.queue_capacity";
pub const REPLICATION_MAX_RETRIES: &str = "roster.replication.max_retries";
pub const REPLICATION_INITIAL_BACKOFF_MS: &str = "roster.replication.initial_backoff_ms";
pub const REPLICATION_MAX_BACKOFF_MS: &str = "roster.replication.max_backoff_ms";
pub const REPLICATION_TIMEOUT_MS: &str = "roster.replication.timeout_ms";
pub const REPLICATION_SYNC_INTERVAL_SECS: &str = "roster.replication.sync_interval_secs";

pub const LOGS_PATH: &str = "roster.logs.path";
pub const LOGS_LEVEL: &str = "roster.logs.level";
pub const LOGS_CONSOLE_ENABLED: &str = "roster.logs.console.enabled";
pub const LOGS_FILE_ENABLED: &str = "roster.logs.file.enabled";

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8761;
pub const DEFAULT_CONTEXT_PATH: &str = "/roster";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 90;
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RENEWAL_PERCENT_THRESHOLD: f64 = 0.85;
pub const DEFAULT_LOG_LEVEL: &str = "info";
