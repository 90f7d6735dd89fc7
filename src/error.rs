//! Unified error types for the irrigation node firmware.
//!
//! A single [`Error`] enum that every subsystem converts into, so the
//! orchestrator can tell the one fatal class (hardware bring-up) apart from
//! the recoverable ones.  All variants are `Copy` and carry the platform
//! error code (`esp_err_t`) where one exists.

use core::fmt;

use crate::app::ports::StorageError;
use crate::drivers::factory::AdcUnit;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A shared bus or ADC unit could not be brought up.  Fatal for the cycle.
    Init(InitError),
    /// An addressed bus device did not answer or could not be attached.
    Device(DeviceError),
    /// A sensor read failed (stale value reused).
    Sensor(SensorError),
    /// Wi-Fi bring-up or connection failed.
    Network(NetworkError),
    /// Wall-clock synchronisation failed (stale clock used).
    Time(TimeError),
    /// Persistent storage open/read/write/commit failed.
    Persistence(StorageError),
}

impl Error {
    /// Only hardware bring-up failures halt the cycle.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Init(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Device(e) => write!(f, "device: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Time(e) => write!(f, "time: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Hardware bring-up errors (fatal)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The I2C master bus could not be created.
    BusBringUp(i32),
    /// An ADC oneshot unit could not be created.
    AdcUnit { unit: AdcUnit, code: i32 },
    /// An ADC channel could not be configured.
    AdcChannel { unit: AdcUnit, channel: u8, code: i32 },
    /// A GPIO output could not be configured.
    Gpio { pin: i32, code: i32 },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusBringUp(rc) => write!(f, "I2C bus bring-up failed (rc={rc})"),
            Self::AdcUnit { unit, code } => write!(f, "{unit} bring-up failed (rc={code})"),
            Self::AdcChannel { unit, channel, code } => {
                write!(f, "{unit} channel {channel} config failed (rc={code})")
            }
            Self::Gpio { pin, code } => write!(f, "GPIO{pin} config failed (rc={code})"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Bus device errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Nothing acknowledged the probe at this address.
    NotResponding { address: u16, code: i32 },
    /// The bus refused to attach a device at this address.
    AttachFailed { address: u16, code: i32 },
    /// The device was attached but its init sequence could not be sent.
    InitFailed { address: u16, code: i32 },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotResponding { address, code } => {
                write!(f, "no device at 0x{address:02X} (rc={code})")
            }
            Self::AttachFailed { address, code } => {
                write!(f, "attach at 0x{address:02X} failed (rc={code})")
            }
            Self::InitFailed { address, code } => {
                write!(f, "init of device 0x{address:02X} failed (rc={code})")
            }
        }
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error code.
    AdcReadFailed(i32),
    /// The unit has no calibration scheme; only raw reads are available.
    NotCalibrated,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed(rc) => write!(f, "ADC read failed (rc={rc})"),
            Self::NotCalibrated => write!(f, "no calibration scheme"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Netif / Wi-Fi driver could not be initialised.
    StackInit(i32),
    /// Station configuration was rejected.
    Configure(i32),
    /// `esp_wifi_start` failed.
    Start(i32),
    /// `esp_wifi_connect` failed.
    Connect(i32),
    /// Retry budget exhausted without an address.
    RetriesExhausted(u8),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInit(rc) => write!(f, "Wi-Fi stack init failed (rc={rc})"),
            Self::Configure(rc) => write!(f, "station config rejected (rc={rc})"),
            Self::Start(rc) => write!(f, "Wi-Fi start failed (rc={rc})"),
            Self::Connect(rc) => write!(f, "connect request failed (rc={rc})"),
            Self::RetriesExhausted(n) => write!(f, "gave up after {n} reconnect attempts"),
        }
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Time errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// SNTP client could not be started.
    SntpInit(i32),
    /// No SNTP response within the timeout (milliseconds).
    SyncTimeout(u32),
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SntpInit(rc) => write!(f, "SNTP init failed (rc={rc})"),
            Self::SyncTimeout(ms) => write!(f, "no time sync within {ms} ms"),
        }
    }
}

impl From<TimeError> for Error {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
