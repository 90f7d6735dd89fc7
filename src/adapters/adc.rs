//! ADC oneshot adapter.
//!
//! Implements [`AdcPort`] on the ESP-IDF `adc_oneshot` driver with 12 dB
//! attenuation and 12-bit conversions.  Calibration uses the line-fitting
//! scheme; chips without it report a raw-only unit.

use crate::app::ports::AdcPort;
use crate::drivers::factory::AdcUnit;

/// Full-scale raw value for 12-bit conversions.
pub const RAW_MAX: u16 = 4095;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct AdcOneshotAdapter {
    units: [adc_oneshot_unit_handle_t; 2],
    cali: [adc_cali_handle_t; 2],
}

#[cfg(target_os = "espidf")]
impl AdcOneshotAdapter {
    pub fn new() -> Self {
        Self {
            units: [core::ptr::null_mut(); 2],
            cali: [core::ptr::null_mut(); 2],
        }
    }

    fn slot(unit: AdcUnit) -> usize {
        match unit {
            AdcUnit::Unit1 => 0,
            AdcUnit::Unit2 => 1,
        }
    }

    fn unit_id(unit: AdcUnit) -> adc_unit_t {
        match unit {
            AdcUnit::Unit1 => adc_unit_t_ADC_UNIT_1,
            AdcUnit::Unit2 => adc_unit_t_ADC_UNIT_2,
        }
    }
}

#[cfg(target_os = "espidf")]
impl AdcPort for AdcOneshotAdapter {
    fn bring_up_unit(&mut self, unit: AdcUnit) -> Result<(), i32> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: Self::unit_id(unit),
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        // SAFETY: the factory calls this at most once per unit; the handle
        // is owned by this adapter for the life of the process.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut self.units[Self::slot(unit)]) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }

    fn create_calibration(&mut self, unit: AdcUnit) -> Result<bool, i32> {
        let cfg = adc_cali_line_fitting_config_t {
            unit_id: Self::unit_id(unit),
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            ..Default::default()
        };
        let ret = unsafe { adc_cali_create_scheme_line_fitting(&cfg, &mut self.cali[Self::slot(unit)]) };
        if ret == ESP_ERR_NOT_SUPPORTED as i32 {
            return Ok(false);
        }
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(true)
    }

    fn configure_channel(&mut self, unit: AdcUnit, channel: u8) -> Result<(), i32> {
        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        let ret = unsafe {
            adc_oneshot_config_channel(self.units[Self::slot(unit)], u32::from(channel), &chan_cfg)
        };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(())
    }

    fn read_raw(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        let mut raw: i32 = 0;
        // SAFETY: the unit handle was created in bring_up_unit(); main task only.
        let ret = unsafe { adc_oneshot_read(self.units[Self::slot(unit)], u32::from(channel), &mut raw) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(raw.clamp(0, i32::from(RAW_MAX)) as u16)
    }

    fn read_millivolts(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        let cali = self.cali[Self::slot(unit)];
        if cali.is_null() {
            return Err(ESP_ERR_INVALID_STATE as i32);
        }
        let raw = self.read_raw(unit, channel)?;
        let mut mv: i32 = 0;
        let ret = unsafe { adc_cali_raw_to_voltage(cali, i32::from(raw), &mut mv) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(mv.max(0) as u16)
    }
}

// ── Simulation backend ────────────────────────────────────────

/// Host-side ADC with settable per-channel values.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct AdcOneshotAdapter {
    values: std::collections::HashMap<(AdcUnit, u8), Result<u16, i32>>,
    unit_error: Option<(AdcUnit, i32)>,
    uncalibrated: bool,
    up: [bool; 2],
}

#[cfg(not(target_os = "espidf"))]
impl AdcOneshotAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sim_set_raw(&mut self, unit: AdcUnit, channel: u8, raw: u16) {
        self.values.insert((unit, channel), Ok(raw.min(RAW_MAX)));
    }

    /// Make conversions on `channel` fail with `code`.
    pub fn sim_fail_channel(&mut self, unit: AdcUnit, channel: u8, code: i32) {
        self.values.insert((unit, channel), Err(code));
    }

    pub fn sim_fail_unit(&mut self, unit: AdcUnit, code: i32) {
        self.unit_error = Some((unit, code));
    }

    pub fn sim_set_uncalibrated(&mut self, uncalibrated: bool) {
        self.uncalibrated = uncalibrated;
    }

    fn is_up(&self, unit: AdcUnit) -> bool {
        match unit {
            AdcUnit::Unit1 => self.up[0],
            AdcUnit::Unit2 => self.up[1],
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl AdcPort for AdcOneshotAdapter {
    fn bring_up_unit(&mut self, unit: AdcUnit) -> Result<(), i32> {
        if let Some((failing, code)) = self.unit_error {
            if failing == unit {
                return Err(code);
            }
        }
        match unit {
            AdcUnit::Unit1 => self.up[0] = true,
            AdcUnit::Unit2 => self.up[1] = true,
        }
        Ok(())
    }

    fn create_calibration(&mut self, _unit: AdcUnit) -> Result<bool, i32> {
        Ok(!self.uncalibrated)
    }

    fn configure_channel(&mut self, unit: AdcUnit, channel: u8) -> Result<(), i32> {
        if !self.is_up(unit) || channel > 9 {
            return Err(-1);
        }
        Ok(())
    }

    fn read_raw(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        self.values.get(&(unit, channel)).copied().unwrap_or(Ok(0))
    }

    /// Linear 0..=3100 mV over the raw range, roughly the 12 dB span.
    fn read_millivolts(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        let raw = self.read_raw(unit, channel)?;
        Ok((u32::from(raw) * 3100 / u32::from(RAW_MAX)) as u16)
    }
}
