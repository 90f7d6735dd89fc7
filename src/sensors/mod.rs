//! Sensor reading pipeline.
//!
//! Moisture and tank-level probes share one ADC unit.  The pipeline asks
//! the [`BusResourceFactory`] for a channel the first time each sensor is
//! read, then reuses it for the rest of the wake cycle:
//!
//! ```text
//!   read_moisture() ──▶ AnalogSensor ──▶ raw ──▶ map_to_percentage ──▶ SensorReading
//!                          │
//!                          └── first use: factory.create_adc_channel(unit, ch)
//! ```
//!
//! The only error that escapes is a failed unit/channel bring-up, which is
//! fatal for the cycle.  Conversion failures reuse the last raw value.

pub mod analog;

use serde::Serialize;

use crate::app::ports::AdcPort;
use crate::app::ports::BusPort;
use crate::config::{SensorCalibration, SystemConfig};
use crate::drivers::factory::BusResourceFactory;
use crate::error::Result;
use analog::AnalogSensor;

/// One mapped sample.  Recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub raw: u16,
    pub percentage: f32,
    pub inverted: bool,
}

pub struct SensorPipeline<'f, B: BusPort, A: AdcPort> {
    factory: &'f BusResourceFactory<B, A>,
    moisture_cal: SensorCalibration,
    water_cal: Option<SensorCalibration>,
    moisture: Option<AnalogSensor<'f>>,
    water: Option<AnalogSensor<'f>>,
}

impl<'f, B: BusPort, A: AdcPort> SensorPipeline<'f, B, A> {
    pub fn new(factory: &'f BusResourceFactory<B, A>, config: &SystemConfig) -> Self {
        Self {
            factory,
            moisture_cal: config.moisture,
            water_cal: config.water_sensor_enabled.then_some(config.water),
            moisture: None,
            water: None,
        }
    }

    pub fn has_water_sensor(&self) -> bool {
        self.water_cal.is_some()
    }

    pub fn read_moisture(&mut self) -> Result<SensorReading> {
        let sensor = Self::sensor(&mut self.moisture, self.factory, "Moisture", self.moisture_cal)?;
        Ok(sensor.read())
    }

    /// Tank level.  Nodes without a tank probe read as an empty reading.
    pub fn read_water(&mut self) -> Result<SensorReading> {
        let Some(cal) = self.water_cal else {
            return Ok(SensorReading {
                raw: 0,
                percentage: 0.0,
                inverted: false,
            });
        };
        let sensor = Self::sensor(&mut self.water, self.factory, "Water", cal)?;
        Ok(sensor.read())
    }

    /// Both readings; the tank reading is `None` when no probe is fitted.
    pub fn read_all(&mut self) -> Result<(SensorReading, Option<SensorReading>)> {
        let moisture = self.read_moisture()?;
        let water = if self.has_water_sensor() {
            Some(self.read_water()?)
        } else {
            None
        };
        Ok((moisture, water))
    }

    /// Whether the most recent sample of either sensor was stale.
    pub fn any_stale(&self) -> bool {
        [&self.moisture, &self.water]
            .into_iter()
            .flatten()
            .any(AnalogSensor::last_read_failed)
    }

    fn sensor<'s>(
        slot: &'s mut Option<AnalogSensor<'f>>,
        factory: &'f BusResourceFactory<B, A>,
        tag: &'static str,
        cal: SensorCalibration,
    ) -> Result<&'s mut AnalogSensor<'f>> {
        let sensor = match slot.take() {
            Some(sensor) => sensor,
            None => AnalogSensor::new(tag, factory.create_adc_channel(cal.unit, cal.channel)?, cal),
        };
        Ok(slot.insert(sensor))
    }
}
