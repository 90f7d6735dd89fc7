//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  Commands go to the driver; outcomes come back as
//! [`Event`]s posted on the shared [`EventBus`] by system-event-loop
//! subscriptions, where the [`WifiManager`](crate::app::wifi::WifiManager)
//! picks them up.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: a scripted simulation that posts the same events.

use log::{info, warn};

use crate::app::credentials::Credentials;
use crate::app::ports::ConnectivityPort;
use crate::error::NetworkError;
use crate::events::{Event, EventBus, IpEvent, WifiEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{self as esp_wifi, AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

#[cfg(not(target_os = "espidf"))]
use core::net::Ipv4Addr;

/// Disconnect reason the simulation reports (`WIFI_REASON_BEACON_TIMEOUT`).
#[cfg(not(target_os = "espidf"))]
pub const SIM_DISCONNECT_REASON: u16 = 200;

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter<'b> {
    bus: &'b EventBus,
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
    wifi: Option<EspWifi<'static>>,
    subscriptions: heapless::Vec<EspSubscription<'static, System>, 2>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter<'static> {
    pub fn new(
        bus: &'static EventBus,
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Self {
        Self {
            bus,
            modem: Some(modem),
            sysloop,
            nvs,
            wifi: None,
            subscriptions: heapless::Vec::new(),
        }
    }

    fn subscribe(&mut self) -> Result<(), NetworkError> {
        let bus = self.bus;
        let wifi_sub = self
            .sysloop
            .subscribe::<esp_wifi::WifiEvent, _>(move |event| match event {
                esp_wifi::WifiEvent::StaStarted => {
                    bus.post(Event::Wifi(WifiEvent::StaStarted));
                }
                esp_wifi::WifiEvent::StaDisconnected(info) => {
                    bus.post(Event::Wifi(WifiEvent::StaDisconnected {
                        reason: u16::from(info.reason()),
                    }));
                }
                _ => {}
            })
            .map_err(|e| NetworkError::StackInit(e.code()))?;

        let bus = self.bus;
        let ip_sub = self
            .sysloop
            .subscribe::<esp_idf_svc::netif::IpEvent, _>(move |event| {
                if let esp_idf_svc::netif::IpEvent::DhcpIpAssigned(assignment) = event {
                    bus.post(Event::Ip(IpEvent::StaGotIp { ip: assignment.ip() }));
                }
            })
            .map_err(|e| NetworkError::StackInit(e.code()))?;

        // Dropping a subscription unsubscribes it, so a full table is an error.
        for sub in [wifi_sub, ip_sub] {
            if self.subscriptions.push(sub).is_err() {
                warn!("WiFi: subscription table full");
                return Err(NetworkError::StackInit(esp_idf_svc::sys::ESP_ERR_NO_MEM as i32));
            }
        }
        Ok(())
    }

    fn driver(&mut self) -> Result<&mut EspWifi<'static>, NetworkError> {
        self.wifi
            .as_mut()
            .ok_or(NetworkError::Configure(esp_idf_svc::sys::ESP_ERR_INVALID_STATE as i32))
    }
}

#[cfg(target_os = "espidf")]
impl ConnectivityPort for WifiAdapter<'static> {
    fn init_stack(&mut self) -> Result<(), NetworkError> {
        if self.wifi.is_some() {
            return Ok(());
        }
        let Some(modem) = self.modem.take() else {
            return Err(NetworkError::StackInit(
                esp_idf_svc::sys::ESP_ERR_INVALID_STATE as i32,
            ));
        };
        let wifi = EspWifi::new(modem, self.sysloop.clone(), self.nvs.take())
            .map_err(|e| NetworkError::StackInit(e.code()))?;
        self.wifi = Some(wifi);
        self.subscribe()?;
        info!("WiFi: station stack initialised");
        Ok(())
    }

    fn apply_credentials(&mut self, credentials: &Credentials) -> Result<(), NetworkError> {
        let auth_method = if credentials.secret.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: credentials.network_id.clone(),
            password: credentials.secret.clone(),
            auth_method,
            ..Default::default()
        };
        self.driver()?
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| NetworkError::Configure(e.code()))
    }

    fn start(&mut self) -> Result<(), NetworkError> {
        self.driver()?
            .start()
            .map_err(|e| NetworkError::Start(e.code()))
    }

    fn connect(&mut self) -> Result<(), NetworkError> {
        self.driver()?
            .connect()
            .map_err(|e| NetworkError::Connect(e.code()))
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Host-side station.  Posts the events the real driver would.
#[cfg(not(target_os = "espidf"))]
pub struct WifiAdapter<'b> {
    bus: &'b EventBus,
    stack_up: bool,
    configured: Option<Credentials>,
    /// Connection attempts that fail before one succeeds.
    failures_remaining: u32,
    /// Post nothing at all, as a hung driver would.
    silent: bool,
    connects: u32,
}

#[cfg(not(target_os = "espidf"))]
impl<'b> WifiAdapter<'b> {
    pub fn new(bus: &'b EventBus) -> Self {
        Self {
            bus,
            stack_up: false,
            configured: None,
            failures_remaining: 0,
            silent: false,
            connects: 0,
        }
    }

    /// Fail the next `n` connection attempts.
    pub fn sim_fail_connects(&mut self, n: u32) {
        self.failures_remaining = n;
    }

    pub fn sim_set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn sim_connects(&self) -> u32 {
        self.connects
    }

    pub fn configured(&self) -> Option<&Credentials> {
        self.configured.as_ref()
    }

    fn post(&self, event: Event) {
        if !self.silent {
            self.bus.post(event);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl ConnectivityPort for WifiAdapter<'_> {
    fn init_stack(&mut self) -> Result<(), NetworkError> {
        self.stack_up = true;
        info!("WiFi(sim): station stack initialised");
        Ok(())
    }

    fn apply_credentials(&mut self, credentials: &Credentials) -> Result<(), NetworkError> {
        if !self.stack_up {
            return Err(NetworkError::Configure(-1));
        }
        self.configured = Some(credentials.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), NetworkError> {
        if self.configured.is_none() {
            return Err(NetworkError::Start(-1));
        }
        self.post(Event::Wifi(WifiEvent::StaStarted));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), NetworkError> {
        self.connects += 1;
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            warn!("WiFi(sim): attempt {} refused", self.connects);
            self.post(Event::Wifi(WifiEvent::StaDisconnected {
                reason: SIM_DISCONNECT_REASON,
            }));
        } else {
            self.post(Event::Ip(IpEvent::StaGotIp {
                ip: Ipv4Addr::new(192, 168, 4, 2),
            }));
        }
        Ok(())
    }
}
