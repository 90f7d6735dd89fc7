//! Timed deep sleep.
//!
//! The RTC timer wakes the chip after the requested interval; the wake is a
//! full reset, so [`enter_deep_sleep`] never returns on the device.  Host
//! builds log the request and return so the simulation can end cleanly.

use log::info;

use crate::app::ports::PowerPort;

/// Sleep requests shorter than this are rounded up (µs).
pub const MIN_SLEEP_US: u64 = 1_000_000;

/// Clamp a requested interval to what the wake timer accepts.
pub fn sleep_duration_us(requested_us: u64) -> u64 {
    requested_us.max(MIN_SLEEP_US)
}

#[cfg(target_os = "espidf")]
pub fn enter_deep_sleep(duration_us: u64) {
    let duration_us = sleep_duration_us(duration_us);
    info!("Sleep: entering deep sleep for {} s", duration_us / 1_000_000);
    // SAFETY: esp_deep_sleep configures the RTC timer wake source and powers
    // down; all outputs were switched off by the caller.
    unsafe { esp_idf_svc::sys::esp_deep_sleep(duration_us) }
}

#[cfg(not(target_os = "espidf"))]
pub fn enter_deep_sleep(duration_us: u64) {
    let duration_us = sleep_duration_us(duration_us);
    info!("Sleep(sim): deep sleep for {} s requested", duration_us / 1_000_000);
}

/// [`PowerPort`] backed by the RTC wake timer.
#[derive(Debug, Default)]
pub struct DeepSleep {
    last_request_us: Option<u64>,
}

impl DeepSleep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration of the last sleep request, after clamping.
    pub fn last_request_us(&self) -> Option<u64> {
        self.last_request_us
    }
}

impl PowerPort for DeepSleep {
    fn deep_sleep(&mut self, duration_us: u64) {
        self.last_request_us = Some(sleep_duration_us(duration_us));
        enter_deep_sleep(duration_us);
    }
}
