//! Concrete state handler functions and table builder.
//!
//! Each stage is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  BOOTED ──[network started]──▶ WIFI_CONFIGURED ──[clock synced]──▶ TIME_SYNCED
//!                                      │                                 │
//!                                 [irrigate]                        [irrigate]
//!                                      ▼                                 │
//!                                  DECIDING ◀────────────────────────────┘
//!                                      │
//!                               [decision made]
//!                                      ▼
//!                                    ACTED ──[action done]──▶ SCHEDULED
//! ```

use super::context::{CycleContext, OutputCommands};
use super::{StateDescriptor, StateId};
use crate::control::IrrigationDecision;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Called once per cycle.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Booted,
            name: "Booted",
            on_enter: Some(booted_enter),
            on_exit: None,
            on_update: booted_update,
            allowed: &[StateId::WifiConfigured],
        },
        StateDescriptor {
            id: StateId::WifiConfigured,
            name: "WifiConfigured",
            on_enter: None,
            on_exit: None,
            on_update: wifi_configured_update,
            allowed: &[StateId::TimeSynced, StateId::Deciding],
        },
        StateDescriptor {
            id: StateId::TimeSynced,
            name: "TimeSynced",
            on_enter: None,
            on_exit: None,
            on_update: time_synced_update,
            allowed: &[StateId::Deciding],
        },
        StateDescriptor {
            id: StateId::Deciding,
            name: "Deciding",
            on_enter: Some(deciding_enter),
            on_exit: None,
            on_update: deciding_update,
            allowed: &[StateId::Acted],
        },
        StateDescriptor {
            id: StateId::Acted,
            name: "Acted",
            on_enter: Some(acted_enter),
            on_exit: Some(acted_exit),
            on_update: acted_update,
            allowed: &[StateId::Scheduled],
        },
        StateDescriptor {
            id: StateId::Scheduled,
            name: "Scheduled",
            on_enter: Some(scheduled_enter),
            on_exit: None,
            on_update: scheduled_update,
            allowed: &[],
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  BOOTED
// ═══════════════════════════════════════════════════════════════════════════

fn booted_enter(ctx: &mut CycleContext) {
    ctx.commands = OutputCommands::all_off();
}

fn booted_update(ctx: &CycleContext) -> Option<StateId> {
    ctx.network_started.then_some(StateId::WifiConfigured)
}

// ═══════════════════════════════════════════════════════════════════════════
//  WIFI_CONFIGURED / TIME_SYNCED
// ═══════════════════════════════════════════════════════════════════════════

fn wifi_configured_update(ctx: &CycleContext) -> Option<StateId> {
    if ctx.clock_synced {
        Some(StateId::TimeSynced)
    } else if ctx.irrigate_requested {
        info!("Cycle: proceeding without time sync (network {})", ctx.network.name());
        Some(StateId::Deciding)
    } else {
        None
    }
}

fn time_synced_update(ctx: &CycleContext) -> Option<StateId> {
    ctx.irrigate_requested.then_some(StateId::Deciding)
}

// ═══════════════════════════════════════════════════════════════════════════
//  DECIDING
// ═══════════════════════════════════════════════════════════════════════════

fn deciding_enter(ctx: &mut CycleContext) {
    ctx.commands.sensor_power = true;
    ctx.commands.warning_led = false;
}

fn deciding_update(ctx: &CycleContext) -> Option<StateId> {
    ctx.decision.map(|_| StateId::Acted)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTED
// ═══════════════════════════════════════════════════════════════════════════

fn acted_enter(ctx: &mut CycleContext) {
    match ctx.decision {
        Some(IrrigationDecision::Irrigate) => ctx.commands.pump = true,
        Some(IrrigationDecision::WarnLowWater) => {
            warn!("Cycle: low water, pump inhibited");
            ctx.commands.pump = false;
            ctx.commands.warning_led = true;
        }
        Some(IrrigationDecision::Skip) | None => ctx.commands.pump = false,
    }
}

fn acted_exit(ctx: &mut CycleContext) {
    ctx.commands.pump = false;
}

fn acted_update(ctx: &CycleContext) -> Option<StateId> {
    ctx.action_done.then_some(StateId::Scheduled)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCHEDULED (terminal)
// ═══════════════════════════════════════════════════════════════════════════

fn scheduled_enter(ctx: &mut CycleContext) {
    ctx.commands.pump = false;
    ctx.commands.sensor_power = false;
}

fn scheduled_update(_ctx: &CycleContext) -> Option<StateId> {
    None
}
