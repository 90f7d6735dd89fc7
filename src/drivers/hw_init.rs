//! One-shot GPIO output configuration and level writes.
//!
//! Uses raw ESP-IDF sys calls.  Called once from `main()` before the cycle
//! starts; every output is driven low as it is configured.
//!
//! On host builds the levels are kept in a process-wide table so tests and
//! the simulation can observe what the drivers asked for.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

use crate::error::InitError;

/// Configure `pins` as push-pull outputs, initially low.
#[cfg(target_os = "espidf")]
pub fn configure_outputs(pins: &[i32]) -> Result<(), InitError> {
    for &pin in pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called from the single-threaded boot path before any
        // driver touches these pins.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(InitError::Gpio { pin, code: ret });
        }
        unsafe { gpio_set_level(pin, 0) };
    }
    info!("hw_init: {} GPIO outputs configured", pins.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_outputs(pins: &[i32]) -> Result<(), InitError> {
    for &pin in pins {
        if !(0..64).contains(&pin) {
            return Err(InitError::Gpio { pin, code: -1 });
        }
        sim::set(pin, false);
    }
    info!("hw_init(sim): {} GPIO outputs configured", pins.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output configured in
    // configure_outputs(); main task only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim::set(pin, high);
}

/// Last level written to `pin` (host builds only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_level(pin: i32) -> bool {
    sim::get(pin)
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU64, Ordering};

    static LEVELS: AtomicU64 = AtomicU64::new(0);

    pub fn set(pin: i32, high: bool) {
        let Some(mask) = mask(pin) else { return };
        if high {
            LEVELS.fetch_or(mask, Ordering::Relaxed);
        } else {
            LEVELS.fetch_and(!mask, Ordering::Relaxed);
        }
    }

    pub fn get(pin: i32) -> bool {
        mask(pin).is_some_and(|m| LEVELS.load(Ordering::Relaxed) & m != 0)
    }

    fn mask(pin: i32) -> Option<u64> {
        u32::try_from(pin).ok().and_then(|p| 1u64.checked_shl(p))
    }
}
