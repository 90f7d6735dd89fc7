//! Process-wide event channel.
//!
//! Events are produced by:
//! - the Wi-Fi driver's system event loop (station started / disconnected)
//! - the IP stack (address acquired)
//! - the cycle itself (sync time, irrigate, settings)
//!
//! Events are consumed by the orchestrator's loop, one at a time in FIFO
//! order, and dispatched by [`EventRouter`] to whoever registered for the
//! (base, id) pair.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ WiFi driver │────▶│              │     │ EventRouter  │──▶ WifiManager
//! │ IP stack    │────▶│   EventBus   │────▶│  (base, id)  │
//! │ Orchestrator│────▶│  (bounded)   │     │              │──▶ cycle
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

/// Pending-event capacity.
pub const EVENT_QUEUE_CAP: usize = 16;

// ── Event taxonomy ────────────────────────────────────────────

/// Event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBase {
    /// Events the cycle posts to itself.
    Irrigation,
    /// Wi-Fi driver events.
    Wifi,
    /// IP stack events.
    Ip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrrigationEvent {
    SyncTime = 0,
    Irrigate = 1,
    Settings = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    StaStarted,
    StaDisconnected { reason: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpEvent {
    StaGotIp { ip: Ipv4Addr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Irrigation(IrrigationEvent),
    Wifi(WifiEvent),
    Ip(IpEvent),
}

impl Event {
    pub const SYNC_TIME: Self = Self::Irrigation(IrrigationEvent::SyncTime);
    pub const IRRIGATE: Self = Self::Irrigation(IrrigationEvent::Irrigate);
    pub const SETTINGS: Self = Self::Irrigation(IrrigationEvent::Settings);

    pub fn base(&self) -> EventBase {
        match self {
            Self::Irrigation(_) => EventBase::Irrigation,
            Self::Wifi(_) => EventBase::Wifi,
            Self::Ip(_) => EventBase::Ip,
        }
    }

    /// Numeric id within the family.  Platform ids match ESP-IDF's
    /// `wifi_event_t` / `ip_event_t`.
    pub fn id(&self) -> u32 {
        match self {
            Self::Irrigation(e) => *e as u32,
            Self::Wifi(WifiEvent::StaStarted) => 2,
            Self::Wifi(WifiEvent::StaDisconnected { .. }) => 5,
            Self::Ip(IpEvent::StaGotIp { .. }) => 0,
        }
    }
}

// ── Bounded channel ───────────────────────────────────────────

/// FIFO shared between platform callbacks and the orchestrator loop.
///
/// `const fn new()` so the binary can keep it in a `static` that driver
/// callbacks reach without a captured context.
pub struct EventBus {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue an event.  Returns `false` if the queue is full (event dropped).
    pub fn post(&self, event: Event) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("Events: queue full, dropped {:?}", event);
                false
            }
        }
    }

    /// Next pending event, if any.
    pub fn try_next(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Dispatch ──────────────────────────────────────────────────

/// Consumer a registered event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The Wi-Fi connection manager.
    Wifi,
    /// The irrigation cycle.
    Cycle,
}

const MAX_ROUTES: usize = 8;

/// Handler table keyed by (base, id); `None` id matches the whole family.
pub struct EventRouter {
    routes: heapless::Vec<(EventBase, Option<u32>, Route), MAX_ROUTES>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            routes: heapless::Vec::new(),
        }
    }

    /// The routing used by every wake cycle.
    pub fn standard() -> Self {
        let mut router = Self::new();
        router.register(EventBase::Wifi, None, Route::Wifi);
        router.register(EventBase::Ip, Some(0), Route::Wifi);
        router.register(EventBase::Irrigation, Some(IrrigationEvent::SyncTime as u32), Route::Cycle);
        router.register(EventBase::Irrigation, Some(IrrigationEvent::Irrigate as u32), Route::Cycle);
        router.register(EventBase::Irrigation, Some(IrrigationEvent::Settings as u32), Route::Cycle);
        router
    }

    /// Register a handler.  Returns `false` when the table is full.
    pub fn register(&mut self, base: EventBase, id: Option<u32>, route: Route) -> bool {
        self.routes.push((base, id, route)).is_ok()
    }

    /// First registered handler matching `event`.
    pub fn route(&self, event: &Event) -> Option<Route> {
        let (base, id) = (event.base(), event.id());
        let hit = self
            .routes
            .iter()
            .find(|(b, i, _)| *b == base && i.is_none_or(|i| i == id))
            .map(|(_, _, r)| *r);
        if hit.is_none() {
            debug!("Events: no handler for {:?}/{}", base, id);
        }
        hit
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
