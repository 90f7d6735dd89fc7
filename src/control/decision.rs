//! Irrigation decision rule.
//!
//! Compares raw samples against two configured thresholds:
//!
//! ```text
//!   moisture raw >= needs_water ──┬── water raw <= min_safe ──▶ WarnLowWater
//!                                 └── otherwise ──────────────▶ Irrigate
//!   moisture raw <  needs_water ──────────────────────────────▶ Skip
//! ```
//!
//! Thresholds live in the raw ADC domain.  On the capacitive moisture probe
//! a higher raw value means drier soil.

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::sensors::SensorReading;

/// Outcome of one cycle's decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrrigationDecision {
    /// Soil is wet enough.
    Skip,
    /// Soil is dry and the tank has water.
    Irrigate,
    /// Soil is dry but the tank is too low to pump.
    WarnLowWater,
}

impl IrrigationDecision {
    pub fn name(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Irrigate => "irrigate",
            Self::WarnLowWater => "warn_low_water",
        }
    }
}

/// The two raw-domain decision boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionThresholds {
    pub moisture_needs_water_raw: u16,
    pub min_safe_water_raw: u16,
}

impl From<&SystemConfig> for DecisionThresholds {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            moisture_needs_water_raw: cfg.moisture_needs_water_raw,
            min_safe_water_raw: cfg.min_safe_water_raw,
        }
    }
}

/// Decide what this cycle does.
///
/// `water` is `None` on nodes built without a tank sensor; a dry reading
/// then always irrigates.
pub fn decide(
    moisture: &SensorReading,
    water: Option<&SensorReading>,
    thresholds: &DecisionThresholds,
) -> IrrigationDecision {
    if moisture.raw < thresholds.moisture_needs_water_raw {
        return IrrigationDecision::Skip;
    }
    match water {
        Some(w) if w.raw <= thresholds.min_safe_water_raw => IrrigationDecision::WarnLowWater,
        _ => IrrigationDecision::Irrigate,
    }
}
