//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO registers, and scripts the bus, ADC,
//! storage, station and clock so every cycle path can be driven on the host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use embedded_hal::delay::DelayNs;
use irrigation_node::app::credentials::Credentials;
use irrigation_node::app::events::AppEvent;
use irrigation_node::app::ports::{
    ActuatorPort, AdcPort, BusPort, ClockPort, ConnectivityPort, EventSink, PowerPort, RawDevice,
    StorageError, StoragePort,
};
use irrigation_node::config::BusConfig;
use irrigation_node::drivers::factory::AdcUnit;
use irrigation_node::error::{NetworkError, TimeError};
use irrigation_node::events::{Event, EventBus, IpEvent, WifiEvent};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    SensorPower(bool),
    Pump(bool),
    WarningLed(bool),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

/// Outputs, delay and sleep in one, like the real `HardwareAdapter`.
pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    /// Total time spent in `DelayNs`, in milliseconds.
    pub delayed_ms: u64,
    pub slept_us: Option<u64>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            delayed_ms: 0,
            slept_us: None,
        }
    }

    fn last_level(&self, pick: impl Fn(&ActuatorCall) -> Option<bool>) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::AllOff => Some(false),
                other => pick(other),
            })
            .unwrap_or(false)
    }

    pub fn pump_on(&self) -> bool {
        self.last_level(|c| match c {
            ActuatorCall::Pump(on) => Some(*on),
            _ => None,
        })
    }

    pub fn sensor_powered(&self) -> bool {
        self.last_level(|c| match c {
            ActuatorCall::SensorPower(on) => Some(*on),
            _ => None,
        })
    }

    /// The pump was switched on at some point.
    pub fn pump_ever_on(&self) -> bool {
        self.calls.contains(&ActuatorCall::Pump(true))
    }

    pub fn led_ever_on(&self) -> bool {
        self.calls.contains(&ActuatorCall::WarningLed(true))
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn set_sensor_power(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SensorPower(on));
    }

    fn set_pump(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Pump(on));
    }

    fn set_warning_led(&mut self, on: bool) {
        self.calls.push(ActuatorCall::WarningLed(on));
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }
}

impl PowerPort for MockHardware {
    fn deep_sleep(&mut self, duration_us: u64) {
        self.slept_us = Some(duration_us);
    }
}

// ── ScriptedBus ───────────────────────────────────────────────

/// I2C bus that acknowledges a fixed set of addresses.  Frames land in a
/// shared log so tests can read them after the factory took the bus.
#[derive(Default)]
pub struct ScriptedBus {
    pub present: Vec<u16>,
    pub bring_up_error: Option<i32>,
    pub bring_ups: Rc<RefCell<u32>>,
    pub frames: Rc<RefCell<Vec<(u16, Vec<u8>)>>>,
    attached: Vec<u16>,
}

#[allow(dead_code)]
impl ScriptedBus {
    pub fn with_devices(addresses: &[u16]) -> Self {
        Self {
            present: addresses.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing(code: i32) -> Self {
        Self {
            bring_up_error: Some(code),
            ..Self::default()
        }
    }
}

impl BusPort for ScriptedBus {
    fn bring_up(&mut self, _config: &BusConfig) -> Result<(), i32> {
        *self.bring_ups.borrow_mut() += 1;
        self.bring_up_error.map_or(Ok(()), Err)
    }

    fn probe(&mut self, address: u16, _timeout_ms: u32) -> Result<(), i32> {
        if self.present.contains(&address) {
            Ok(())
        } else {
            Err(0x107)
        }
    }

    fn attach(&mut self, address: u16, _scl_hz: u32) -> Result<RawDevice, i32> {
        self.attached.push(address);
        Ok(RawDevice((self.attached.len() - 1) as u8))
    }

    fn transmit(&mut self, device: RawDevice, bytes: &[u8], _timeout_ms: u32) -> Result<(), i32> {
        let address = *self.attached.get(usize::from(device.0)).ok_or(-1)?;
        self.frames.borrow_mut().push((address, bytes.to_vec()));
        Ok(())
    }
}

// ── ScriptedAdc ───────────────────────────────────────────────

/// ADC answering fixed raw values per channel.
#[derive(Default)]
pub struct ScriptedAdc {
    pub values: HashMap<u8, Result<u16, i32>>,
    pub unit_error: Option<i32>,
}

#[allow(dead_code)]
impl ScriptedAdc {
    pub fn with(moisture: u16, water: u16) -> Self {
        let mut adc = Self::default();
        adc.values.insert(irrigation_node::pins::MOISTURE_ADC_CHANNEL, Ok(moisture));
        adc.values.insert(irrigation_node::pins::WATER_ADC_CHANNEL, Ok(water));
        adc
    }
}

impl AdcPort for ScriptedAdc {
    fn bring_up_unit(&mut self, _unit: AdcUnit) -> Result<(), i32> {
        self.unit_error.map_or(Ok(()), Err)
    }

    fn create_calibration(&mut self, _unit: AdcUnit) -> Result<bool, i32> {
        Ok(true)
    }

    fn configure_channel(&mut self, _unit: AdcUnit, _channel: u8) -> Result<(), i32> {
        Ok(())
    }

    fn read_raw(&mut self, _unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        self.values.get(&channel).copied().unwrap_or(Ok(0))
    }

    fn read_millivolts(&mut self, unit: AdcUnit, channel: u8) -> Result<u16, i32> {
        self.read_raw(unit, channel)
    }
}

// ── MemStorage ────────────────────────────────────────────────

/// In-memory key/value store with an "unopenable" switch.
#[derive(Default)]
pub struct MemStorage {
    store: HashMap<String, Vec<u8>>,
    pub unopenable: bool,
    pub fail_writes: bool,
    pub inits: u32,
    pub writes: u32,
    pub commits: u32,
}

#[allow(dead_code)]
impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unopenable() -> Self {
        Self {
            unopenable: true,
            ..Self::default()
        }
    }

    /// A store that already holds `network_id` / `secret`.
    pub fn provisioned(network_id: &str, secret: &str) -> Self {
        let mut storage = Self::new();
        storage.put_str("WIFI_SSID", network_id);
        storage.put_str("WIFI_BSSID", secret);
        storage
    }

    pub fn put_str(&mut self, key: &str, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.store.insert(format!("storage::{}", key), bytes);
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        let bytes = self.store.get(&format!("storage::{}", key))?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8(bytes[..end].to_vec()).ok()
    }
}

impl StoragePort for MemStorage {
    fn init(&mut self) -> Result<(), StorageError> {
        self.inits += 1;
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.unopenable {
            return Err(StorageError::OpenFailed(0x1102));
        }
        let value = self
            .store
            .get(&format!("{}::{}", namespace, key))
            .ok_or(StorageError::NotFound)?;
        if value.len() > buf.len() {
            return Err(StorageError::TooLong);
        }
        buf[..value.len()].copy_from_slice(value);
        Ok(value.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.unopenable {
            return Err(StorageError::OpenFailed(0x1102));
        }
        if self.fail_writes {
            return Err(StorageError::Io(0x1105));
        }
        self.writes += 1;
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn commit(&mut self, _namespace: &str) -> Result<(), StorageError> {
        self.commits += 1;
        Ok(())
    }
}

// ── ScriptedStation ───────────────────────────────────────────

/// Wi-Fi station posting the events the platform would.
pub struct ScriptedStation<'b> {
    bus: &'b EventBus,
    /// Connection attempts refused before one succeeds; `u32::MAX` never connects.
    pub refuse: u32,
    /// Post nothing at all.
    pub silent: bool,
    pub stack_error: Option<i32>,
    pub stack_inits: u32,
    pub connects: u32,
    pub applied: Option<Credentials>,
}

#[allow(dead_code)]
impl<'b> ScriptedStation<'b> {
    pub fn new(bus: &'b EventBus) -> Self {
        Self {
            bus,
            refuse: 0,
            silent: false,
            stack_error: None,
            stack_inits: 0,
            connects: 0,
            applied: None,
        }
    }

    pub fn refusing(bus: &'b EventBus, refuse: u32) -> Self {
        Self {
            refuse,
            ..Self::new(bus)
        }
    }

    pub fn silent(bus: &'b EventBus) -> Self {
        Self {
            silent: true,
            ..Self::new(bus)
        }
    }

    fn post(&self, event: Event) {
        if !self.silent {
            self.bus.post(event);
        }
    }
}

impl ConnectivityPort for ScriptedStation<'_> {
    fn init_stack(&mut self) -> Result<(), NetworkError> {
        self.stack_inits += 1;
        self.stack_error.map_or(Ok(()), |code| Err(NetworkError::StackInit(code)))
    }

    fn apply_credentials(&mut self, credentials: &Credentials) -> Result<(), NetworkError> {
        self.applied = Some(credentials.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), NetworkError> {
        self.post(Event::Wifi(WifiEvent::StaStarted));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), NetworkError> {
        self.connects += 1;
        if self.refuse > 0 {
            self.refuse = self.refuse.saturating_sub(1);
            self.post(Event::Wifi(WifiEvent::StaDisconnected { reason: 201 }));
        } else {
            self.post(Event::Ip(IpEvent::StaGotIp {
                ip: Ipv4Addr::new(10, 0, 0, 42),
            }));
        }
        Ok(())
    }
}

// ── FixedClock ────────────────────────────────────────────────

pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub sync_result: Result<(), TimeError>,
    pub syncs: u32,
}

#[allow(dead_code)]
impl FixedClock {
    /// 2024-06-01 12:00 UTC, 15:00 at the default UTC+3.
    pub fn noon() -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            sync_result: Ok(()),
            syncs: 0,
        }
    }

    pub fn failing_sync() -> Self {
        Self {
            sync_result: Err(TimeError::SyncTimeout(10_000)),
            ..Self::noon()
        }
    }
}

impl ClockPort for FixedClock {
    fn sync(&mut self, _server: &str, _timeout_ms: u32) -> Result<(), TimeError> {
        self.syncs += 1;
        self.sync_result
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_unavailable(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::NetworkUnavailable(_)))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
