//! Self-preservation monitor
//!
//! Compares the heartbeats received in a closed window with the heartbeats
//! the locally owned instances should have sent. When the ratio drops below
//! the threshold the registry stops evicting, on the assumption that the
//! network rather than the instances has failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics;
use crate::shutdown::ShutdownSignal;
use crate::store::RegistryStore;

/// Eviction policy currently in force
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreservationMode {
    #[default]
    Normal,
    SelfPreservation,
}

/// Self-preservation settings
#[derive(Clone, Debug)]
pub struct PreservationConfig {
    pub enabled: bool,
    /// Minimum actual/expected heartbeat ratio before eviction is suppressed
    pub renewal_percent_threshold: f64,
    /// How often a client is expected to renew
    pub expected_heartbeat_interval: Duration,
    /// Length of one heartbeat counting window
    pub window: Duration,
}

impl Default for PreservationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            renewal_percent_threshold: 0.85,
            expected_heartbeat_interval: Duration::from_secs(30),
            window: Duration::from_secs(60),
        }
    }
}

/// Heartbeat counts of one closed window
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatWindow {
    pub expected: f64,
    pub actual: u64,
    pub closed_at: i64,
}

impl HeartbeatWindow {
    /// actual / expected, `None` when nothing was expected
    pub fn ratio(&self) -> Option<f64> {
        (self.expected > 0.0).then(|| self.actual as f64 / self.expected)
    }
}

/// Snapshot of the monitor for status reporting
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreservationStats {
    pub enabled: bool,
    pub mode: PreservationMode,
    pub threshold: f64,
    pub renewals_in_current_window: u64,
    pub last_window: Option<HeartbeatWindow>,
    pub last_ratio: Option<f64>,
}

pub struct SelfPreservationMonitor {
    config: PreservationConfig,
    store: Arc<RegistryStore>,
    clock: Arc<dyn Clock>,
    heartbeats: AtomicU64,
    last_window: RwLock<Option<HeartbeatWindow>>,
    preserving: AtomicBool,
}

impl SelfPreservationMonitor {
    pub fn new(config: PreservationConfig, store: Arc<RegistryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            heartbeats: AtomicU64::new(0),
            last_window: RwLock::new(None),
            preserving: AtomicBool::new(false),
        }
    }

    /// Count one heartbeat from a locally owned instance
    pub fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the current window and start a new one
    pub fn roll_window(&self) -> HeartbeatWindow {
        let actual = self.heartbeats.swap(0, Ordering::AcqRel);
        let per_instance = self.config.window.as_secs_f64()
            / self.config.expected_heartbeat_interval.as_secs_f64().max(f64::EPSILON);
        let expected = self.store.local_instance_count() as f64 * per_instance;

        let window = HeartbeatWindow {
            expected,
            actual,
            closed_at: self.clock.now_millis(),
        };
        *self.last_window.write() = Some(window);

        debug!(
            expected = window.expected,
            actual = window.actual,
            "Closed heartbeat window"
        );
        metrics::record_heartbeat_window(&window);
        window
    }

    /// Decide the mode from the last closed window
    pub fn evaluate(&self) -> PreservationMode {
        let window = *self.last_window.read();
        let below_threshold = window
            .and_then(|w| w.ratio())
            .is_some_and(|ratio| ratio < self.config.renewal_percent_threshold);
        let preserving = self.config.enabled && below_threshold;

        let was_preserving = self.preserving.swap(preserving, Ordering::AcqRel);
        if preserving && !was_preserving {
            warn!(
                expected = window.map(|w| w.expected).unwrap_or_default(),
                actual = window.map(|w| w.actual).unwrap_or_default(),
                threshold = self.config.renewal_percent_threshold,
                "Renewal rate below threshold, entering self-preservation mode"
            );
        } else if !preserving && was_preserving {
            info!("Renewal rate recovered, leaving self-preservation mode");
        }

        let mode = if preserving {
            PreservationMode::SelfPreservation
        } else {
            PreservationMode::Normal
        };
        metrics::record_preservation_mode(mode);
        mode
    }

    pub fn mode(&self) -> PreservationMode {
        if self.preserving.load(Ordering::Acquire) {
            PreservationMode::SelfPreservation
        } else {
            PreservationMode::Normal
        }
    }

    pub fn is_eviction_allowed(&self) -> bool {
        self.mode() == PreservationMode::Normal
    }

    pub fn stats(&self) -> PreservationStats {
        let last_window = *self.last_window.read();
        PreservationStats {
            enabled: self.config.enabled,
            mode: self.mode(),
            threshold: self.config.renewal_percent_threshold,
            renewals_in_current_window: self.heartbeats.load(Ordering::Relaxed),
            last_window,
            last_ratio: last_window.and_then(|w| w.ratio()),
        }
    }

    /// Close a window every `config.window` until shutdown
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        let period = self.config.window;
        let mut ticker = interval_at(Instant::now() + period, period);
        let mut listener = shutdown.subscribe();

        info!(window = ?period, "Heartbeat stats task started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.roll_window();
                }
                _ = listener.cancelled() => {
                    info!("Heartbeat stats task stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::InstanceRegistration;

    fn setup(instances: usize, config: PreservationConfig) -> (Arc<RegistryStore>, SelfPreservationMonitor) {
        let store = Arc::new(RegistryStore::new());
        for i in 0..instances {
            store.register(
                InstanceRegistration::new("exchange", &format!("e{}", i), "localhost", 8000)
                    .into_record(0, Duration::from_secs(90)),
            );
        }
        let monitor = SelfPreservationMonitor::new(config, store.clone(), Arc::new(ManualClock::default()));
        (store, monitor)
    }

    #[test]
    fn test_no_window_is_normal() {
        let (_, monitor) = setup(10, PreservationConfig::default());
        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
        assert!(monitor.is_eviction_allowed());
    }

    #[test]
    fn test_expected_from_local_instances() {
        let (_, monitor) = setup(10, PreservationConfig::default());
        for _ in 0..20 {
            monitor.record_heartbeat();
        }
        let window = monitor.roll_window();
        // 60s window / 30s interval = 2 heartbeats per instance
        assert_eq!(window.expected, 20.0);
        assert_eq!(window.actual, 20);
        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
    }

    #[test]
    fn test_low_ratio_enters_and_recovers() {
        let (_, monitor) = setup(10, PreservationConfig::default());
        for _ in 0..5 {
            monitor.record_heartbeat();
        }
        monitor.roll_window();
        assert_eq!(monitor.evaluate(), PreservationMode::SelfPreservation);
        assert!(!monitor.is_eviction_allowed());

        for _ in 0..18 {
            monitor.record_heartbeat();
        }
        monitor.roll_window();
        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
    }

    #[test]
    fn test_counter_resets_on_roll() {
        let (_, monitor) = setup(1, PreservationConfig::default());
        monitor.record_heartbeat();
        monitor.roll_window();
        assert_eq!(monitor.stats().renewals_in_current_window, 0);
        assert_eq!(monitor.roll_window().actual, 0);
    }

    #[test]
    fn test_empty_registry_stays_normal() {
        let (_, monitor) = setup(0, PreservationConfig::default());
        let window = monitor.roll_window();
        assert_eq!(window.ratio(), None);
        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
    }

    #[test]
    fn test_disabled_reports_ratio_but_stays_normal() {
        let config = PreservationConfig {
            enabled: false,
            ..Default::default()
        };
        let (_, monitor) = setup(4, config);
        monitor.roll_window();

        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
        let stats = monitor.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.last_ratio, Some(0.0));
    }

    #[test]
    fn test_replicated_entries_not_expected() {
        let (store, monitor) = setup(0, PreservationConfig::default());
        store.apply_remote(
            InstanceRegistration::new("exchange", "r1", "localhost", 8000)
                .into_record(0, Duration::from_secs(90)),
            "node-b",
        );
        assert_eq!(monitor.roll_window().expected, 0.0);
        assert_eq!(monitor.evaluate(), PreservationMode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_rolls_windows_until_shutdown() {
        let config = PreservationConfig {
            window: Duration::from_secs(10),
            ..Default::default()
        };
        let (_, monitor) = setup(1, config);
        let monitor = Arc::new(monitor);
        let shutdown = ShutdownSignal::new();

        monitor.record_heartbeat();
        let task = tokio::spawn(monitor.clone().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(monitor.stats().last_window.map(|w| w.actual), Some(1));

        shutdown.trigger();
        task.await.unwrap();
    }
}
