//! Application core: the irrigation cycle and the network logic around it.
//!
//! This module holds the business rules for one wake cycle: credential
//! reconciliation, the Wi-Fi retry policy and the orchestration of sensing,
//! deciding, acting and scheduling.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod credentials;
pub mod events;
pub mod ports;
pub mod service;
pub mod wifi;
