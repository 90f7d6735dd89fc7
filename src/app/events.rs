//! Outbound application events.
//!
//! The [`IrrigationService`](super::service::IrrigationService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial today, publish
//! upstream once the node has a telemetry channel.

use serde::Serialize;

use crate::control::IrrigationDecision;
use crate::fsm::StateId;
use crate::fsm::context::NetworkStatus;
use crate::sensors::SensorReading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The cycle has started (carries initial stage).
    Started(StateId),

    /// The cycle moved to another stage.
    StageChanged { from: StateId, to: StateId },

    /// Fresh sensor readings.  `water` is `None` without a tank probe.
    Readings {
        moisture: SensorReading,
        water: Option<SensorReading>,
    },

    /// The irrigation decision for this cycle.
    DecisionMade(IrrigationDecision),

    /// Networking ended without connectivity.
    NetworkUnavailable(NetworkStatus),

    /// The cycle finished and is about to sleep.
    CycleCompleted(CycleReport),
}

/// End-of-cycle summary.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub decision: IrrigationDecision,
    pub moisture: SensorReading,
    pub water: Option<SensorReading>,
    /// Readings taken after the pump ran, when it ran.
    pub moisture_after: Option<SensorReading>,
    pub water_after: Option<SensorReading>,
    pub network: NetworkStatus,
    pub clock_synced: bool,
    pub sleep_us: u64,
}
