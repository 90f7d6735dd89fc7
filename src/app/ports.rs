//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ IrrigationService (domain)
//! ```
//!
//! Driven adapters (bus, ADC, outputs, storage, Wi-Fi, clock, sleep, event
//! sinks) implement these traits.  The
//! [`IrrigationService`](super::service::IrrigationService) and the
//! [`BusResourceFactory`](crate::drivers::factory::BusResourceFactory)
//! consume them via generics, so the domain core never touches hardware
//! directly.  Blocking waits go through [`embedded_hal::delay::DelayNs`].
//!
//! Hardware ports return the raw platform error code (`esp_err_t`) on
//! failure; the domain decides whether that code is fatal.

use chrono::{DateTime, Utc};

use crate::app::credentials::Credentials;
use crate::config::{BusConfig, SystemConfig};
use crate::drivers::factory::AdcUnit;
use crate::error::{NetworkError, TimeError};

// ───────────────────────────────────────────────────────────────
// I2C bus port (driven adapter: domain → I2C master driver)
// ───────────────────────────────────────────────────────────────

/// Index of a device attached to the bus, assigned by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDevice(pub u8);

/// Low-level I2C master operations.  Exactly one bus per port instance.
pub trait BusPort {
    /// Create the master bus with the given pins, clock and glitch filter.
    fn bring_up(&mut self, config: &BusConfig) -> Result<(), i32>;

    /// Check whether anything acknowledges `address`.
    fn probe(&mut self, address: u16, timeout_ms: u32) -> Result<(), i32>;

    /// Attach a device at `address` and return its handle.
    fn attach(&mut self, address: u16, scl_hz: u32) -> Result<RawDevice, i32>;

    /// Write `bytes` to an attached device.
    fn transmit(&mut self, device: RawDevice, bytes: &[u8], timeout_ms: u32) -> Result<(), i32>;
}

// ───────────────────────────────────────────────────────────────
// ADC port (driven adapter: domain → ADC oneshot driver)
// ───────────────────────────────────────────────────────────────

/// Low-level ADC oneshot operations.  Units are independent.
pub trait AdcPort {
    /// Create the oneshot unit.
    fn bring_up_unit(&mut self, unit: AdcUnit) -> Result<(), i32>;

    /// Create the unit's calibration scheme.
    ///
    /// `Ok(false)` means the chip has no supported scheme (raw-only unit).
    fn create_calibration(&mut self, unit: AdcUnit) -> Result<bool, i32>;

    /// Configure attenuation and bit width for a channel.
    fn configure_channel(&mut self, unit: AdcUnit, channel: u8) -> Result<(), i32>;

    /// Raw conversion result.
    fn read_raw(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32>;

    /// Calibrated voltage in millivolts.  Only valid on calibrated units.
    fn read_millivolts(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → GPIO)
// ───────────────────────────────────────────────────────────────

/// Write-side port: fire-and-forget GPIO outputs.
pub trait ActuatorPort {
    /// Switch the sensor supply rail.
    fn set_sensor_power(&mut self, on: bool);

    /// Switch the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Switch the low-water warning indicator.
    fn set_warning_led(&mut self, on: bool);

    /// Switch every output off.
    fn all_off(&mut self) {
        self.set_pump(false);
        self.set_sensor_power(false);
        self.set_warning_led(false);
    }
}

// ───────────────────────────────────────────────────────────────
// Power port (driven adapter: domain → deep sleep)
// ───────────────────────────────────────────────────────────────

/// Requests a timed low-power sleep.  On the device this never returns: the
/// next wake is a fresh boot.
pub trait PowerPort {
    fn deep_sleep(&mut self, duration_us: u64);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain → Wi-Fi station)
// ───────────────────────────────────────────────────────────────

/// Wi-Fi station control.  Outcomes are not returned here: the platform
/// posts `WifiEvent`/`IpEvent`s onto the [`EventBus`](crate::events::EventBus).
pub trait ConnectivityPort {
    /// Bring up netif and the Wi-Fi driver.  Called once per boot.
    fn init_stack(&mut self) -> Result<(), NetworkError>;

    /// Load SSID/secret into the station configuration.
    fn apply_credentials(&mut self, credentials: &Credentials) -> Result<(), NetworkError>;

    /// Start the station; the platform answers with `StaStarted`.
    fn start(&mut self) -> Result<(), NetworkError>;

    /// Issue one connection attempt.
    fn connect(&mut self) -> Result<(), NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: domain ↔ RTC / SNTP)
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Block until SNTP sets the clock or `timeout_ms` elapses.
    fn sync(&mut self, server: &str, timeout_ms: u32) -> Result<(), TimeError>;

    /// Current wall-clock time, synced or not.
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting: an out-of-range value
/// is rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced persistent key-value storage.
///
/// Opening a namespace is a distinct failure from a missing key: callers
/// use [`StorageError::OpenFailed`] to tell an unprovisioned store apart
/// from one that merely lacks a field.
pub trait StoragePort {
    /// Initialise the backing flash partition.  Idempotent.
    fn init(&mut self) -> Result<(), StorageError>;

    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Stage a value.  Not durable until [`commit`](Self::commit).
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Make staged writes in `namespace` durable.
    fn commit(&mut self, namespace: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError(i32),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The flash partition could not be initialised.
    InitFailed(i32),
    /// The namespace could not be opened (store not provisioned).
    OpenFailed(i32),
    /// Requested key does not exist.
    NotFound,
    /// Stored value does not fit the caller's buffer.
    TooLong,
    /// Read/write/commit failed.
    Io(i32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(rc) => write!(f, "I/O error (rc={})", rc),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InitFailed(rc) => write!(f, "flash init failed (rc={})", rc),
            Self::OpenFailed(rc) => write!(f, "namespace open failed (rc={})", rc),
            Self::NotFound => write!(f, "key not found"),
            Self::TooLong => write!(f, "value too long"),
            Self::Io(rc) => write!(f, "I/O error (rc={})", rc),
        }
    }
}
