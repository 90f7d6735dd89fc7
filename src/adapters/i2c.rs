//! I2C master adapter.
//!
//! Implements [`BusPort`] on the ESP-IDF `i2c_master` driver.  One bus per
//! adapter; attached devices are kept in a fixed table and addressed by
//! their index ([`RawDevice`]).
//!
//! The simulation backend answers for a configurable set of addresses and
//! records every transmitted frame.

#[cfg(not(target_os = "espidf"))]
use log::info;

use crate::app::ports::{BusPort, RawDevice};
use crate::config::BusConfig;

/// Devices that can be attached to one bus.
pub const MAX_DEVICES: usize = 4;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct I2cMasterAdapter {
    bus: i2c_master_bus_handle_t,
    devices: heapless::Vec<i2c_master_dev_handle_t, MAX_DEVICES>,
}

#[cfg(target_os = "espidf")]
impl I2cMasterAdapter {
    pub fn new() -> Self {
        Self {
            bus: core::ptr::null_mut(),
            devices: heapless::Vec::new(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl BusPort for I2cMasterAdapter {
    fn bring_up(&mut self, config: &BusConfig) -> Result<(), i32> {
        let mut bus_cfg = i2c_master_bus_config_t {
            i2c_port: i32::from(config.port),
            sda_io_num: config.sda_gpio,
            scl_io_num: config.scl_gpio,
            clk_source: soc_periph_i2c_clk_src_t_I2C_CLK_SRC_DEFAULT,
            glitch_ignore_cnt: config.glitch_ignore_count,
            ..Default::default()
        };
        bus_cfg.flags.set_enable_internal_pullup(1);

        // SAFETY: bus_cfg is fully initialised; the handle is written once
        // and owned by this adapter for the life of the process.
        let ret = unsafe { i2c_new_master_bus(&bus_cfg, &mut self.bus) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }

    fn probe(&mut self, address: u16, timeout_ms: u32) -> Result<(), i32> {
        let ret = unsafe { i2c_master_probe(self.bus, address, timeout_ms as i32) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }

    fn attach(&mut self, address: u16, scl_hz: u32) -> Result<RawDevice, i32> {
        if self.devices.is_full() {
            return Err(ESP_ERR_NO_MEM as i32);
        }
        let dev_cfg = i2c_device_config_t {
            dev_addr_length: i2c_addr_bit_len_t_I2C_ADDR_BIT_LEN_7,
            device_address: address,
            scl_speed_hz: scl_hz,
            ..Default::default()
        };
        let mut dev: i2c_master_dev_handle_t = core::ptr::null_mut();
        let ret = unsafe { i2c_master_bus_add_device(self.bus, &dev_cfg, &mut dev) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let index = self.devices.len() as u8;
        // Capacity checked above.
        let _ = self.devices.push(dev);
        Ok(RawDevice(index))
    }

    fn transmit(&mut self, device: RawDevice, bytes: &[u8], timeout_ms: u32) -> Result<(), i32> {
        let Some(&dev) = self.devices.get(usize::from(device.0)) else {
            return Err(ESP_ERR_INVALID_ARG as i32);
        };
        // SAFETY: `dev` was returned by i2c_master_bus_add_device and is
        // never removed; `bytes` is valid for its length.
        let ret = unsafe { i2c_master_transmit(dev, bytes.as_ptr(), bytes.len(), timeout_ms as i32) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }
}

// ── Simulation backend ────────────────────────────────────────

/// `ESP_ERR_NOT_FOUND`: nothing acknowledged the address.
#[cfg(not(target_os = "espidf"))]
pub const SIM_NACK: i32 = 0x105;

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct I2cMasterAdapter {
    present: heapless::Vec<u16, MAX_DEVICES>,
    bring_up_error: Option<i32>,
    up: bool,
    devices: heapless::Vec<u16, MAX_DEVICES>,
    frames: Vec<(u16, Vec<u8>)>,
}

#[cfg(not(target_os = "espidf"))]
impl I2cMasterAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer probes at `address`.
    pub fn sim_add_device(&mut self, address: u16) {
        let _ = self.present.push(address);
    }

    /// Fail bus creation with `code`.
    pub fn sim_fail_bring_up(&mut self, code: i32) {
        self.bring_up_error = Some(code);
    }

    /// Every frame transmitted so far, with its device address.
    pub fn sim_frames(&self) -> &[(u16, Vec<u8>)] {
        &self.frames
    }
}

#[cfg(not(target_os = "espidf"))]
impl BusPort for I2cMasterAdapter {
    fn bring_up(&mut self, config: &BusConfig) -> Result<(), i32> {
        if let Some(code) = self.bring_up_error {
            return Err(code);
        }
        self.up = true;
        info!("I2C(sim): port {} up", config.port);
        Ok(())
    }

    fn probe(&mut self, address: u16, _timeout_ms: u32) -> Result<(), i32> {
        if self.up && self.present.contains(&address) {
            Ok(())
        } else {
            Err(SIM_NACK)
        }
    }

    fn attach(&mut self, address: u16, _scl_hz: u32) -> Result<RawDevice, i32> {
        let index = self.devices.len() as u8;
        self.devices.push(address).map_err(|_| -1)?;
        Ok(RawDevice(index))
    }

    fn transmit(&mut self, device: RawDevice, bytes: &[u8], _timeout_ms: u32) -> Result<(), i32> {
        let address = *self.devices.get(usize::from(device.0)).ok_or(-1)?;
        self.frames.push((address, bytes.to_vec()));
        Ok(())
    }
}
