//! Switched supply rail for the analog probes.
//!
//! The probes corrode and drain the battery when powered continuously, so
//! the rail is only up between the warm-up and the last reading of a cycle.

use log::debug;

use crate::drivers::hw_init;

pub struct SensorRail {
    pin: i32,
    powered: bool,
}

impl SensorRail {
    pub fn new(pin: i32) -> Self {
        Self {
            pin,
            powered: false,
        }
    }

    pub fn set(&mut self, on: bool) {
        if on != self.powered {
            debug!("Rail: sensor power {}", if on { "on" } else { "off" });
        }
        hw_init::gpio_write(self.pin, on);
        self.powered = on;
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }
}
