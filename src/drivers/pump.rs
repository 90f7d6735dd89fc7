//! Irrigation pump relay driver.
//!
//! One GPIO drives the relay coil: HIGH = pumping.  The driver is a dumb
//! actuator; the low-water interlock lives in the decision step.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the relay GPIO via hw_init helpers.
//! On host/test: hw_init records the level in memory.

use log::info;

use crate::drivers::hw_init;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
}

pub struct PumpDriver {
    pin: i32,
    state: PumpState,
}

impl PumpDriver {
    pub fn new(pin: i32) -> Self {
        Self {
            pin,
            state: PumpState::Stopped,
        }
    }

    pub fn start(&mut self) {
        if self.state == PumpState::Running {
            return;
        }
        hw_init::gpio_write(self.pin, true);
        self.state = PumpState::Running;
        info!("Pump: on (GPIO{})", self.pin);
    }

    pub fn stop(&mut self) {
        hw_init::gpio_write(self.pin, false);
        if self.state == PumpState::Running {
            info!("Pump: off (GPIO{})", self.pin);
        }
        self.state = PumpState::Stopped;
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }
}
