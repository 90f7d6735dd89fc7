//! GPIO / peripheral pin assignments for the irrigation node board.
//!
//! Default wiring only: [`SystemConfig`](crate::config::SystemConfig) copies
//! these at construction, and a stored config may override them.

// ---------------------------------------------------------------------------
// Outputs (push-pull, driven low at boot)
// ---------------------------------------------------------------------------

/// High-side switch feeding the soil and tank sensors.
pub const SENSOR_POWER_GPIO: i32 = 32;
/// Pump relay coil driver.  HIGH = pumping.
pub const PUMP_GPIO: i32 = 33;
/// Low-water warning LED.
pub const WARNING_LED_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil moisture probe.  ADC1 channel 6 (GPIO 34).
pub const MOISTURE_ADC_CHANNEL: u8 = 6;
/// Resistive tank level probe.  ADC1 channel 7 (GPIO 35).
pub const WATER_ADC_CHANNEL: u8 = 7;

// ---------------------------------------------------------------------------
// I²C bus (character LCD backpack)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;

/// PCF8574 backpack on the 16x2 LCD.
pub const LCD_I2C_ADDRESS: u16 = 0x27;
