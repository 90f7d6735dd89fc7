//! Low-water warning LED.
//!
//! A single GPIO, active high.  Latched on by a low-water decision and left
//! on until the node goes to sleep.

use crate::drivers::hw_init;

pub struct StatusLed {
    pin: i32,
    lit: bool,
}

impl StatusLed {
    pub fn new(pin: i32) -> Self {
        Self { pin, lit: false }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(self.pin, on);
        self.lit = on;
    }

    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
