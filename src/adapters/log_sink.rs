//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).  The
//! end-of-cycle report is one JSON line so it can be scraped from a serial
//! capture.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(stage) => {
                info!("START | stage={:?}", stage);
            }
            AppEvent::StageChanged { from, to } => {
                info!("STAGE | {:?} -> {:?}", from, to);
            }
            AppEvent::Readings { moisture, water } => match water {
                Some(w) => info!(
                    "READ  | moisture raw={} ({:.1}%) | water raw={} ({:.1}%)",
                    moisture.raw, moisture.percentage, w.raw, w.percentage
                ),
                None => info!(
                    "READ  | moisture raw={} ({:.1}%) | water n/a",
                    moisture.raw, moisture.percentage
                ),
            },
            AppEvent::DecisionMade(decision) => {
                info!("DECIDE| {}", decision.name());
            }
            AppEvent::NetworkUnavailable(status) => {
                warn!("NET   | offline cycle ({})", status.name());
            }
            AppEvent::CycleCompleted(report) => match serde_json::to_string(report) {
                Ok(json) => info!("CYCLE | {}", json),
                Err(e) => warn!("CYCLE | report not serialisable: {}", e),
            },
        }
    }
}
