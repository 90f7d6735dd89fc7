//! System configuration parameters
//!
//! All tunable parameters for one irrigation node.  Defaults match the
//! reference board; values can be overridden by a config blob stored in NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::drivers::factory::AdcUnit;
use crate::pins;

/// Raw-domain calibration for one analog sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCalibration {
    /// ADC unit the sensor is wired to.
    pub unit: AdcUnit,
    /// ADC channel on that unit.
    pub channel: u8,
    /// Raw value mapped to 0 % (100 % when inverted).
    pub raw_min: u16,
    /// Raw value mapped to 100 % (0 % when inverted).
    pub raw_max: u16,
    /// Lower raw = higher percentage.
    pub inverted: bool,
}

/// Fixed I2C master bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub port: u8,
    pub sda_gpio: i32,
    pub scl_gpio: i32,
    /// SCL clock for attached devices (Hz).
    pub scl_hz: u32,
    /// Glitch filter width in APB cycles.
    pub glitch_ignore_count: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: 0,
            sda_gpio: pins::I2C_SDA_GPIO,
            scl_gpio: pins::I2C_SCL_GPIO,
            scl_hz: 100_000,
            glitch_ignore_count: 7,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Schedule ---
    /// Local hour of the daily run (0-23)
    pub target_hour: u8,
    /// Local minute of the daily run (0-59)
    pub target_minute: u8,
    /// Fixed offset of local time from UTC, in minutes
    pub utc_offset_minutes: i16,

    // --- Sensors ---
    pub moisture: SensorCalibration,
    pub water: SensorCalibration,
    /// Cycle runs without a water-level sensor when false
    pub water_sensor_enabled: bool,

    // --- Decision thresholds (raw ADC counts) ---
    /// Moisture raw at or above this means the soil needs water
    pub moisture_needs_water_raw: u16,
    /// Water raw at or below this means the tank is too low to pump
    pub min_safe_water_raw: u16,

    // --- Timing ---
    /// Delay after powering the sensor rail (seconds)
    pub sensor_warm_up_secs: u16,
    /// Pump on-time per irrigation (seconds)
    pub pump_on_secs: u16,
    /// SNTP wait (milliseconds)
    pub time_sync_timeout_ms: u32,
    /// Longest wait for a Wi-Fi outcome before irrigating anyway (seconds)
    pub network_timeout_secs: u16,

    // --- Network ---
    /// Consecutive reconnect budget per wake cycle
    pub wifi_max_retries: u8,
    pub ntp_server: heapless::String<32>,

    // --- Wiring ---
    pub bus: BusConfig,
    pub sensor_power_gpio: i32,
    pub pump_gpio: i32,
    pub warning_led_gpio: i32,
    /// 7-bit address of the character display, `None` for a headless node
    pub display_address: Option<u16>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut ntp_server = heapless::String::new();
        // "pool.ntp.org" is 12 bytes, well inside the capacity.
        let _ = ntp_server.push_str("pool.ntp.org");

        Self {
            // Schedule: 18:00 local, UTC+3
            target_hour: 18,
            target_minute: 0,
            utc_offset_minutes: 180,

            // Sensors
            moisture: SensorCalibration {
                unit: AdcUnit::Unit1,
                channel: pins::MOISTURE_ADC_CHANNEL,
                raw_min: 400,
                raw_max: 820,
                inverted: true,
            },
            water: SensorCalibration {
                unit: AdcUnit::Unit1,
                channel: pins::WATER_ADC_CHANNEL,
                raw_min: 100,
                raw_max: 495,
                inverted: false,
            },
            water_sensor_enabled: true,

            // Thresholds
            moisture_needs_water_raw: 715,
            min_safe_water_raw: 300,

            // Timing
            sensor_warm_up_secs: 10,
            pump_on_secs: 20,
            time_sync_timeout_ms: 10_000,
            network_timeout_secs: 60,

            // Network
            wifi_max_retries: 5,
            ntp_server,

            // Wiring
            bus: BusConfig::default(),
            sensor_power_gpio: pins::SENSOR_POWER_GPIO,
            pump_gpio: pins::PUMP_GPIO,
            warning_led_gpio: pins::WARNING_LED_GPIO,
            display_address: Some(pins::LCD_I2C_ADDRESS),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Used before persisting and after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_hour > 23 {
            return Err(ConfigError::ValidationFailed("target_hour must be 0–23"));
        }
        if self.target_minute > 59 {
            return Err(ConfigError::ValidationFailed("target_minute must be 0–59"));
        }
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::ValidationFailed(
                "utc_offset_minutes must be -720–840",
            ));
        }
        for cal in [&self.moisture, &self.water] {
            if cal.raw_min >= cal.raw_max {
                return Err(ConfigError::ValidationFailed(
                    "sensor raw_min must be < raw_max",
                ));
            }
            if cal.channel > 9 {
                return Err(ConfigError::ValidationFailed("ADC channel must be 0–9"));
            }
        }
        if !(1..=600).contains(&self.pump_on_secs) {
            return Err(ConfigError::ValidationFailed("pump_on_secs must be 1–600"));
        }
        if self.sensor_warm_up_secs > 120 {
            return Err(ConfigError::ValidationFailed(
                "sensor_warm_up_secs must be 0–120",
            ));
        }
        if !(1_000..=60_000).contains(&self.time_sync_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "time_sync_timeout_ms must be 1000–60000",
            ));
        }
        if !(5..=600).contains(&self.network_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "network_timeout_secs must be 5–600",
            ));
        }
        if !(1..=20).contains(&self.wifi_max_retries) {
            return Err(ConfigError::ValidationFailed("wifi_max_retries must be 1–20"));
        }
        if self.ntp_server.is_empty() {
            return Err(ConfigError::ValidationFailed("ntp_server must not be empty"));
        }
        if !(10_000..=1_000_000).contains(&self.bus.scl_hz) {
            return Err(ConfigError::ValidationFailed(
                "bus.scl_hz must be 10000–1000000",
            ));
        }
        if let Some(addr) = self.display_address {
            if !(0x08..=0x77).contains(&addr) {
                return Err(ConfigError::ValidationFailed(
                    "display_address must be a 7-bit address 0x08–0x77",
                ));
            }
        }
        Ok(())
    }
}
