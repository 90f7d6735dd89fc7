//! Single analog sensor on a shared ADC channel.
//!
//! Holds the channel handle lent by the resource factory plus the last good
//! raw sample.  A failed conversion is logged and the previous raw value is
//! returned unchanged; the caller can check [`AnalogSensor::last_read_failed`]
//! to tell a fresh sample from a stale one.

use log::{debug, warn};

use crate::config::SensorCalibration;
use crate::control::percentage::map_to_percentage;
use crate::drivers::factory::AdcChannel;
use crate::error::SensorError;

use super::SensorReading;

pub struct AnalogSensor<'f> {
    tag: &'static str,
    channel: AdcChannel<'f>,
    calibration: SensorCalibration,
    last_raw: u16,
    last_failed: bool,
}

impl<'f> AnalogSensor<'f> {
    pub fn new(tag: &'static str, channel: AdcChannel<'f>, calibration: SensorCalibration) -> Self {
        Self {
            tag,
            channel,
            calibration,
            last_raw: 0,
            last_failed: false,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Raw sample; the previous one if the conversion fails.
    pub fn read_raw(&mut self) -> u16 {
        match self.channel.read_raw() {
            Ok(raw) => {
                self.last_raw = raw;
                self.last_failed = false;
            }
            Err(SensorError::AdcReadFailed(rc)) => {
                warn!(
                    "{}: {} ch{} read failed (rc={}), reusing raw={}",
                    self.tag,
                    self.channel.unit(),
                    self.channel.channel(),
                    rc,
                    self.last_raw
                );
                self.last_failed = true;
            }
            Err(e) => {
                warn!("{}: read failed ({}), reusing raw={}", self.tag, e, self.last_raw);
                self.last_failed = true;
            }
        }
        self.last_raw
    }

    /// Calibrated millivolts.  Raw-only units answer `NotCalibrated`.
    pub fn read_millivolts(&self) -> Result<u16, SensorError> {
        self.channel.read_millivolts()
    }

    /// Sample and map onto the calibrated percentage range.
    pub fn read(&mut self) -> SensorReading {
        let raw = self.read_raw();
        let cal = &self.calibration;
        let percentage = map_to_percentage(raw, cal.raw_min, cal.raw_max, cal.inverted);
        debug!("{}: raw={} ({:.1}%)", self.tag, raw, percentage);
        SensorReading {
            raw,
            percentage,
            inverted: cal.inverted,
        }
    }

    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    pub fn last_read_failed(&self) -> bool {
        self.last_failed
    }
}
