//! Timing configuration for the installer.
//!
//! Every window the protocol relies on lives here with its reference value
//! as the `Default`. All option structs deserialize with serde, durations
//! written as integer milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a transport reports device changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCapability {
    /// The transport pushes connect, disconnect and app-switch changes.
    PushesDeviceChanges,
    /// The transport cannot notify; the device must be polled.
    RequiresPolling,
}

/// Which device observation strategy drives the executor.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::{ObservationMode, TransportCapability};
///
/// let mode = ObservationMode::for_capability(TransportCapability::RequiresPolling);
/// assert_eq!(mode, ObservationMode::Polling);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationMode {
    /// Trust the device feed and restart the executor on every stable change.
    Event,
    /// Retry the executor against the last known device.
    Polling,
}

impl ObservationMode {
    /// Pick the strategy that fits a transport.
    pub fn for_capability(capability: TransportCapability) -> Self {
        match capability {
            TransportCapability::PushesDeviceChanges => Self::Event,
            TransportCapability::RequiresPolling => Self::Polling,
        }
    }
}

/// Options for a single executor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Silence after which an `UnresponsiveDevice` event is emitted.
    ///
    /// Default: 1 second.
    #[serde(with = "duration_ms")]
    pub unresponsive_after: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            unresponsive_after: Duration::from_millis(1000),
        }
    }
}

/// Options for the event-driven observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDrivenOptions {
    /// Quiet period the device feed must hold before a run starts.
    ///
    /// Default: 1 second.
    #[serde(with = "duration_ms")]
    pub device_debounce: Duration,
}

impl Default for EventDrivenOptions {
    fn default() -> Self {
        Self {
            device_debounce: Duration::from_millis(1000),
        }
    }
}

/// Options for the polling observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingOptions {
    /// Delay between loop iterations. Default: 2 seconds.
    #[serde(with = "duration_ms")]
    pub polling_interval: Duration,

    /// Window for a first device to show up. Default: 5 seconds.
    #[serde(with = "duration_ms")]
    pub init_debounce: Duration,

    /// How long a disconnect is held back before it is surfaced.
    ///
    /// Default: 5 seconds.
    #[serde(with = "duration_ms")]
    pub disconnect_debounce: Duration,

    /// Upper bound for one executor attempt. Default: 20 seconds.
    #[serde(with = "duration_ms")]
    pub attempt_timeout: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(2000),
            init_debounce: Duration::from_millis(5000),
            disconnect_debounce: Duration::from_millis(5000),
            attempt_timeout: Duration::from_millis(20000),
        }
    }
}

/// Options for the reduced UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateOptions {
    /// Quiet period before a reduced state is published. Default: 1.5 seconds.
    #[serde(with = "duration_ms")]
    pub state_debounce: Duration,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            state_debounce: Duration::from_millis(1500),
        }
    }
}

/// Everything a session needs, in one deserializable bundle.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::{InstallerConfig, ObservationMode};
/// use std::time::Duration;
///
/// let config = InstallerConfig::default();
/// assert_eq!(config.mode, ObservationMode::Event);
/// assert_eq!(config.polling.attempt_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Selected observation strategy.
    pub mode: ObservationMode,
    /// Executor timing.
    pub executor: ExecutorOptions,
    /// Event-driven observer timing.
    pub event: EventDrivenOptions,
    /// Polling observer timing.
    pub polling: PollingOptions,
    /// UI state timing.
    pub state: StateOptions,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            mode: ObservationMode::Event,
            executor: ExecutorOptions::default(),
            event: EventDrivenOptions::default(),
            polling: PollingOptions::default(),
            state: StateOptions::default(),
        }
    }
}

impl InstallerConfig {
    /// Default timings with the strategy that fits `capability`.
    pub fn for_capability(capability: TransportCapability) -> Self {
        Self {
            mode: ObservationMode::for_capability(capability),
            ..Default::default()
        }
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
