//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MonitorService (domain)
//! ```
//!
//! Driven adapters (speed inputs, alarm light, event sinks, storage)
//! implement these traits.  The [`MonitorService`](super::service::MonitorService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers handle every variant explicitly.

use crate::config::{InputSource, SystemConfig};
use crate::error::{Error, TimerError};
use crate::sensors::pulse::PulseEpochSample;

// ───────────────────────────────────────────────────────────────
// Speed input port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SpeedInputPort {
    /// Take the pulse epoch handed off by the sample clock, if one is
    /// pending.  Each sample is returned exactly once.
    fn take_pulse_sample(&mut self) -> Option<PulseEpochSample>;

    /// Copy waiting GPS bytes into `buf` without blocking.
    /// Returns the number of bytes written (0 if none).
    fn read_gps(&mut self, buf: &mut [u8]) -> usize;

    /// Route the shared speed input to the pulse ISR or the GPS UART.
    fn select_input(&mut self, source: InputSource) -> Result<(), Error>;
}

// ───────────────────────────────────────────────────────────────
// Alarm output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait AlarmOutputPort {
    /// Drive the alarm light directly (steady on / off).
    fn set_alarm_light(&mut self, on: bool);

    /// Start (or re-time) the flash timer.  The timer ISR toggles the
    /// light every `period_ms`.
    fn program_flash(&mut self, period_ms: u32) -> Result<(), TimerError>;

    /// Stop the flash timer.  The light is left as-is.
    fn disable_flash(&mut self) -> Result<(), TimerError>;

    /// Drive the auxiliary output (panel lamp relay): on while the speed is
    /// above the target.
    fn set_aux_output(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Status light port
// ───────────────────────────────────────────────────────────────

/// On-board heartbeat LED.
pub trait StatusLightPort {
    fn toggle_status_light(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists user settings.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load settings.  A key that is missing or unreadable falls back to its
    /// default; only a storage failure is an error.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist settings.  Last write wins.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Keyed byte storage.  Writes are atomic per key.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value and commit.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A stored value failed to decode.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Full => Self::StorageFull,
            StorageError::NotFound | StorageError::IoError => Self::IoError,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("stored settings corrupted"),
            ConfigError::StorageFull => Self::Config("settings storage full"),
            ConfigError::IoError => Self::Config("settings storage I/O error"),
        }
    }
}
