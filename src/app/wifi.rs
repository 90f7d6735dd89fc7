//! Wi-Fi connection manager.
//!
//! Owns the station's connection state and the reconnect budget for one
//! wake cycle.  Connection outcomes arrive as platform events on the
//! [`EventBus`]; the manager reacts to them and reports a terminal
//! [`WifiOutcome`] to the orchestrator.
//!
//! ```text
//!   Idle ──configure+start──▶ Connecting ──StaStarted──▶ connect()
//!                                │
//!          ┌─────────────────────┤ StaDisconnected
//!          ▼                     │
//!   Retrying{n} ──connect()──────┘   (n < max_retries)
//!          │
//!          └── n == max_retries ──▶ Failed (terminal for this cycle)
//!
//!   any state ──StaGotIp──▶ Connected, retry_count = 0, post SYNC_TIME
//! ```

use core::net::Ipv4Addr;

use log::{error, info, warn};

use crate::app::credentials::{CredentialStore, Credentials};
use crate::app::ports::{ConnectivityPort, StoragePort};
use crate::error::NetworkError;
use crate::events::{Event, EventBus, IpEvent, WifiEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Idle,
    Connecting,
    Connected,
    Retrying { attempt: u8 },
    Failed,
}

/// Terminal result of an event, reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiOutcome {
    Connected(Ipv4Addr),
    Failed,
}

pub struct WifiManager<'b, N: ConnectivityPort> {
    port: N,
    bus: &'b EventBus,
    state: WifiState,
    retry_count: u8,
    max_retries: u8,
    credentials: Credentials,
    enabled: bool,
}

impl<'b, N: ConnectivityPort> WifiManager<'b, N> {
    pub fn new(port: N, bus: &'b EventBus, max_retries: u8) -> Self {
        Self {
            port,
            bus,
            state: WifiState::Idle,
            retry_count: 0,
            max_retries,
            credentials: Credentials::not_provisioned(),
            enabled: false,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Networking was brought up this cycle.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn port(&self) -> &N {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut N {
        &mut self.port
    }

    /// Initialise storage and, for loaded credentials, the network stack.
    ///
    /// Unloaded credentials leave networking off for the whole cycle.
    pub fn configure<S: StoragePort>(
        &mut self,
        credentials: &Credentials,
        store: &mut CredentialStore<S>,
    ) -> Result<(), NetworkError> {
        if let Err(e) = store.ensure_init() {
            warn!("WiFi: storage init failed: {}", e);
        }

        self.credentials = credentials.clone();
        if !credentials.loaded {
            info!("WiFi: no stored configuration, networking disabled this cycle");
            return Ok(());
        }

        info!("WiFi: configuring station (SSID='{}')", credentials.network_id);
        self.port.init_stack()?;
        self.enabled = true;
        Ok(())
    }

    /// Apply the credentials and start the station.  No-op when disabled.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if !self.enabled {
            return Ok(());
        }
        self.port.apply_credentials(&self.credentials)?;
        self.port.start()?;
        self.state = WifiState::Connecting;
        Ok(())
    }

    /// React to a Wi-Fi or IP event.
    pub fn handle_event(&mut self, event: &Event) -> Option<WifiOutcome> {
        match *event {
            Event::Wifi(WifiEvent::StaStarted) => {
                self.state = WifiState::Connecting;
                self.attempt_connect();
                None
            }
            Event::Wifi(WifiEvent::StaDisconnected { reason }) => self.on_disconnected(reason),
            Event::Ip(IpEvent::StaGotIp { ip }) => {
                info!("WiFi: got ip {}", ip);
                self.retry_count = 0;
                self.state = WifiState::Connected;
                self.bus.post(Event::SYNC_TIME);
                Some(WifiOutcome::Connected(ip))
            }
            Event::Irrigation(_) => None,
        }
    }

    fn on_disconnected(&mut self, reason: u16) -> Option<WifiOutcome> {
        if self.state == WifiState::Failed {
            return None;
        }

        self.retry_count = self.retry_count.saturating_add(1);
        if self.retry_count < self.max_retries {
            info!(
                "WiFi: disconnected (reason={}), retry {}/{}",
                reason, self.retry_count, self.max_retries
            );
            self.state = WifiState::Retrying {
                attempt: self.retry_count,
            };
            self.attempt_connect();
            None
        } else {
            error!(
                "WiFi: connect to the AP failed after {} attempts (reason={})",
                self.retry_count, reason
            );
            self.state = WifiState::Failed;
            Some(WifiOutcome::Failed)
        }
    }

    fn attempt_connect(&mut self) {
        if let Err(e) = self.port.connect() {
            warn!("WiFi: {}", e);
        }
    }
}
