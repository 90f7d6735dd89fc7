//! Hardware adapter: bridges the output drivers to domain port traits.
//!
//! Owns the pump relay, sensor rail, warning LED, the blocking delay and
//! the deep-sleep request, exposing them through [`ActuatorPort`],
//! [`DelayNs`] and [`PowerPort`].  On non-espidf targets the drivers record
//! levels in memory and the delay really sleeps the thread.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{ActuatorPort, PowerPort};
use crate::config::SystemConfig;
use crate::drivers::hw_init;
use crate::drivers::pump::PumpDriver;
use crate::drivers::rail::SensorRail;
use crate::drivers::status_led::StatusLed;
use crate::error::InitError;
use crate::power::DeepSleep;

/// Blocking delay for the current target.
#[cfg(target_os = "espidf")]
pub type SystemDelay = esp_idf_hal::delay::Delay;

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

#[cfg(not(target_os = "espidf"))]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

fn system_delay() -> SystemDelay {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_hal::delay::Delay::new_default()
    }
    #[cfg(not(target_os = "espidf"))]
    {
        SystemDelay
    }
}

/// Concrete adapter that combines the outputs, delay and sleep behind port traits.
pub struct HardwareAdapter {
    pump: PumpDriver,
    rail: SensorRail,
    led: StatusLed,
    delay: SystemDelay,
    power: DeepSleep,
}

impl HardwareAdapter {
    /// Configure the output pins named in `config` (all driven low).
    pub fn new(config: &SystemConfig) -> Result<Self, InitError> {
        hw_init::configure_outputs(&[
            config.sensor_power_gpio,
            config.pump_gpio,
            config.warning_led_gpio,
        ])?;
        Ok(Self {
            pump: PumpDriver::new(config.pump_gpio),
            rail: SensorRail::new(config.sensor_power_gpio),
            led: StatusLed::new(config.warning_led_gpio),
            delay: system_delay(),
            power: DeepSleep::new(),
        })
    }

    pub fn pump(&self) -> &PumpDriver {
        &self.pump
    }

    pub fn rail(&self) -> &SensorRail {
        &self.rail
    }

    pub fn led(&self) -> &StatusLed {
        &self.led
    }

    pub fn last_sleep_us(&self) -> Option<u64> {
        self.power.last_request_us()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_sensor_power(&mut self, on: bool) {
        self.rail.set(on);
    }

    fn set_pump(&mut self, on: bool) {
        if on {
            self.pump.start();
        } else {
            self.pump.stop();
        }
    }

    fn set_warning_led(&mut self, on: bool) {
        self.led.set(on);
    }
}

// ── DelayNs implementation ────────────────────────────────────

impl DelayNs for HardwareAdapter {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ── PowerPort implementation ──────────────────────────────────

impl PowerPort for HardwareAdapter {
    fn deep_sleep(&mut self, duration_us: u64) {
        self.all_off();
        self.power.deep_sleep(duration_us);
    }
}
