//! Control logic: raw-to-percentage mapping and the irrigation decision.
//!
//! Pure functions only: no hardware, no logging side effects beyond what
//! the caller chooses to do with the result.

pub mod decision;
pub mod percentage;

pub use decision::{DecisionThresholds, IrrigationDecision, decide};
pub use percentage::map_to_percentage;
