//! Shared mutable context threaded through every FSM handler.
//!
//! `CycleContext` is the blackboard for one wake cycle: what the network
//! did, whether the clock was synced, the readings taken, the decision made
//! and the output levels the stages request.

use serde::Serialize;

use crate::config::SystemConfig;
use crate::control::IrrigationDecision;
use crate::sensors::SensorReading;

// ---------------------------------------------------------------------------
// Network status (written by the orchestrator from Wi-Fi outcomes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkStatus {
    /// Station started, no outcome yet.
    Pending,
    /// No stored configuration; networking never started.
    Disabled,
    Connected,
    /// Retry budget exhausted.
    Failed,
    /// No outcome within the network deadline.
    TimedOut,
}

impl NetworkStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Disabled => "disabled",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

// ---------------------------------------------------------------------------
// Output commands (written by state handlers; applied by the orchestrator)
// ---------------------------------------------------------------------------

/// Requested GPIO output levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputCommands {
    pub sensor_power: bool,
    pub pump: bool,
    pub warning_led: bool,
}

impl OutputCommands {
    /// Every output off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// CycleContext
// ---------------------------------------------------------------------------

pub struct CycleContext {
    pub config: SystemConfig,

    // -- Progress facts --
    /// Wi-Fi configure + start has been attempted.
    pub network_started: bool,
    pub network: NetworkStatus,
    pub clock_synced: bool,
    /// An `IRRIGATE` event was received.
    pub irrigate_requested: bool,

    // -- Readings / decision --
    pub moisture: Option<SensorReading>,
    pub water: Option<SensorReading>,
    pub decision: Option<IrrigationDecision>,
    /// The branch action (pump run, warning, nothing) has finished.
    pub action_done: bool,

    // -- Outputs --
    pub commands: OutputCommands,
}

impl CycleContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            network_started: false,
            network: NetworkStatus::Pending,
            clock_synced: false,
            irrigate_requested: false,
            moisture: None,
            water: None,
            decision: None,
            action_done: false,
            commands: OutputCommands::all_off(),
        }
    }
}
