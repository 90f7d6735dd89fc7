//! Wi-Fi manager driven by a scripted station through the event bus.
//!
//! The station posts exactly what the platform would; the tests pump the
//! bus the way the orchestrator does and check the retry policy.

use crate::mock_hw::{MemStorage, ScriptedStation};

use irrigation_node::app::credentials::{CredentialStore, Credentials};
use irrigation_node::app::wifi::{WifiManager, WifiOutcome, WifiState};
use irrigation_node::events::{Event, EventBus, WifiEvent};

fn creds() -> Credentials {
    Credentials::new("garden-ap", "hunter22hunter22").unwrap()
}

/// Feed every queued event to the manager until one yields an outcome.
fn pump<'b>(
    wifi: &mut WifiManager<'b, ScriptedStation<'b>>,
    bus: &EventBus,
) -> Option<WifiOutcome> {
    while let Some(event) = bus.try_next() {
        if event == Event::SYNC_TIME {
            continue;
        }
        if let Some(outcome) = wifi.handle_event(&event) {
            return Some(outcome);
        }
    }
    None
}

#[test]
fn connects_after_a_few_refusals() {
    let bus = EventBus::new();
    let mut store = CredentialStore::new(MemStorage::new());
    let mut wifi = WifiManager::new(ScriptedStation::refusing(&bus, 3), &bus, 5);

    wifi.configure(&creds(), &mut store).unwrap();
    wifi.start().unwrap();

    assert!(matches!(pump(&mut wifi, &bus), Some(WifiOutcome::Connected(_))));
    assert_eq!(wifi.state(), WifiState::Connected);
    assert_eq!(wifi.retry_count(), 0);
    assert_eq!(wifi.port().connects, 4);
    assert_eq!(bus.try_next(), Some(Event::SYNC_TIME));
}

#[test]
fn gives_up_after_the_budget() {
    let bus = EventBus::new();
    let mut store = CredentialStore::new(MemStorage::new());
    let mut wifi = WifiManager::new(ScriptedStation::refusing(&bus, u32::MAX), &bus, 3);

    wifi.configure(&creds(), &mut store).unwrap();
    wifi.start().unwrap();

    assert_eq!(pump(&mut wifi, &bus), Some(WifiOutcome::Failed));
    assert_eq!(wifi.state(), WifiState::Failed);
    assert_eq!(wifi.port().connects, 3);
    assert!(bus.is_empty(), "no further connect once failed");

    // A late disconnect changes nothing.
    let late = Event::Wifi(WifiEvent::StaDisconnected { reason: 8 });
    assert_eq!(wifi.handle_event(&late), None);
    assert_eq!(wifi.port().connects, 3);
}

#[test]
fn unloaded_credentials_keep_the_radio_off() {
    let bus = EventBus::new();
    let mut store = CredentialStore::new(MemStorage::unopenable());
    let mut wifi = WifiManager::new(ScriptedStation::new(&bus), &bus, 5);

    let loaded = store.load();
    assert!(!loaded.loaded);
    wifi.configure(&loaded, &mut store).unwrap();
    wifi.start().unwrap();

    assert!(!wifi.is_enabled());
    assert_eq!(wifi.state(), WifiState::Idle);
    assert_eq!(wifi.port().stack_inits, 0);
    assert!(bus.is_empty());
}

#[test]
fn stack_failure_surfaces_from_configure() {
    let bus = EventBus::new();
    let mut store = CredentialStore::new(MemStorage::new());
    let mut station = ScriptedStation::new(&bus);
    station.stack_error = Some(0x3001);
    let mut wifi = WifiManager::new(station, &bus, 5);

    assert!(wifi.configure(&creds(), &mut store).is_err());
    assert!(!wifi.is_enabled());
}
