//! Bus resource factory, bus devices, GPIO outputs and peripheral helpers.

pub mod factory;
pub mod hw_init;
pub mod lcd;
pub mod pump;
pub mod rail;
pub mod status_led;
