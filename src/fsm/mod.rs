//! Function-pointer finite state machine for one wake cycle.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌────────────────┬──────────┬─────────┬──────────────┬──────────┐ │
//! │  │ StateId        │ on_enter │ on_exit │ on_update    │ allowed  │ │
//! │  ├────────────────┼──────────┼─────────┼──────────────┼──────────┤ │
//! │  │ Booted         │ fn(ctx)  │         │ fn(ctx)->Opt │ [..]     │ │
//! │  │ WifiConfigured │          │         │ fn(ctx)->Opt │ [..]     │ │
//! │  │ TimeSynced     │          │         │ fn(ctx)->Opt │ [..]     │ │
//! │  │ Deciding       │ fn(ctx)  │         │ fn(ctx)->Opt │ [..]     │ │
//! │  │ Acted          │ fn(ctx)  │ fn(ctx) │ fn(ctx)->Opt │ [..]     │ │
//! │  │ Scheduled      │ fn(ctx)  │         │ fn(ctx)->Opt │ []       │ │
//! │  └────────────────┴──────────┴─────────┴──────────────┴──────────┘ │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator writes facts into the [`CycleContext`] blackboard
//! (network started, clock synced, readings taken, decision made) and then
//! ticks the engine.  `on_update` inspects the blackboard and names the next
//! stage; the engine checks it against the state's `allowed` list, runs
//! `on_exit` / `on_enter`, and the actions write output commands back into
//! the context for the orchestrator to apply.

pub mod context;
pub mod states;

use core::fmt;

use context::CycleContext;
use log::{info, warn};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Stages of one wake cycle, in order.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum StateId {
    Booted = 0,
    WifiConfigured = 1,
    TimeSynced = 2,
    Deciding = 3,
    Acted = 4,
    Scheduled = 5,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to `StateId`.  Out-of-range indices map to
    /// `Scheduled` so a corrupted index still ends the cycle.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Booted,
            1 => Self::WifiConfigured,
            2 => Self::TimeSynced,
            3 => Self::Deciding,
            4 => Self::Acted,
            5 => Self::Scheduled,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Scheduled
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut CycleContext);

/// Reads the blackboard and returns `Some(next)` when the stage is done.
pub type StateUpdateFn = fn(&CycleContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
    /// Stages this one may hand over to.
    pub allowed: &'static [StateId],
}

/// A transition the table does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: StateId,
    pub to: StateId,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition {:?} -> {:?} not allowed", self.from, self.to)
    }
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Transitions taken since construction.
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut CycleContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Evaluate the current stage once; transition if it is done.
    ///
    /// Returns the `(from, to)` pair when a transition happened.
    pub fn tick(&mut self, ctx: &mut CycleContext) -> Option<(StateId, StateId)> {
        let from = self.current_state();
        let next = (self.table[self.current].on_update)(ctx)?;
        self.transition(next, ctx).ok().map(|()| (from, next))
    }

    /// Tick until no stage reports completion.  Bounded by the table size.
    pub fn settle(&mut self, ctx: &mut CycleContext, mut on_change: impl FnMut(StateId, StateId)) {
        for _ in 0..StateId::COUNT {
            match self.tick(ctx) {
                Some((from, to)) => on_change(from, to),
                None => break,
            }
        }
    }

    /// Transition to `next` if the current stage allows it.
    pub fn transition(
        &mut self,
        next: StateId,
        ctx: &mut CycleContext,
    ) -> Result<(), InvalidTransition> {
        let from = self.current_state();
        if !self.table[self.current].allowed.contains(&next) {
            warn!("FSM rejected transition: {:?} -> {:?}", from, next);
            return Err(InvalidTransition { from, to: next });
        }

        let next_idx = next as usize;
        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        Ok(())
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// The cycle has reached its final stage.
    pub fn is_terminal(&self) -> bool {
        self.table[self.current].allowed.is_empty()
    }
}
