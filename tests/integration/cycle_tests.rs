//! End-to-end wake cycles: IrrigationService → FSM → actuators → sleep.
//!
//! Every test runs a full `run_cycle` against the mock adapters and checks
//! what the node did to its outputs, what it reported and how long it asked
//! to sleep.

use crate::mock_hw::{
    ActuatorCall, FixedClock, MemStorage, MockHardware, RecordingSink, ScriptedAdc, ScriptedBus,
    ScriptedStation,
};

use irrigation_node::app::credentials::Credentials;
use irrigation_node::app::events::{AppEvent, CycleReport};
use irrigation_node::app::service::IrrigationService;
use irrigation_node::config::SystemConfig;
use irrigation_node::control::IrrigationDecision;
use irrigation_node::drivers::factory::BusResourceFactory;
use irrigation_node::error::{Error, InitError};
use irrigation_node::events::{EVENT_QUEUE_CAP, Event, EventBus};
use irrigation_node::fsm::StateId;
use irrigation_node::fsm::context::NetworkStatus;

/// 15:00 local to 18:00 local.
const THREE_HOURS_US: u64 = 3 * 3_600 * 1_000_000;

fn headless() -> SystemConfig {
    SystemConfig {
        display_address: None,
        ..SystemConfig::default()
    }
}

fn factory(moisture: u16, water: u16) -> BusResourceFactory<ScriptedBus, ScriptedAdc> {
    BusResourceFactory::new(Default::default(), ScriptedBus::default(), ScriptedAdc::with(moisture, water))
}

/// Run one connected, headless cycle with the given readings.
fn run(moisture: u16, water: u16) -> (CycleReport, MockHardware, RecordingSink) {
    let bus = EventBus::new();
    let factory = factory(moisture, water);
    let mut service = IrrigationService::new(
        headless(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());
    let report = service
        .run_cycle(None, &mut hw, &mut clock, &mut sink)
        .expect("cycle should complete");
    assert_eq!(service.stage(), StateId::Scheduled);
    (report, hw, sink)
}

fn position(hw: &MockHardware, call: &ActuatorCall) -> Option<usize> {
    hw.calls.iter().position(|c| c == call)
}

// ── Scenario A: dry soil, water in the tank ──────────────────

#[test]
fn dry_soil_with_water_runs_pump_and_rereads() {
    let (report, hw, sink) = run(900, 450);

    assert_eq!(report.decision, IrrigationDecision::Irrigate);
    assert_eq!(report.moisture.raw, 900);
    assert_eq!(report.moisture.percentage, 0.0);
    assert!(report.water.is_some_and(|w| w.percentage > 80.0));
    assert!(report.moisture_after.is_some());
    assert!(report.water_after.is_some());

    let powered = position(&hw, &ActuatorCall::SensorPower(true)).expect("sensor rail powered");
    let pump_on = position(&hw, &ActuatorCall::Pump(true)).expect("pump started");
    assert!(powered < pump_on, "sensor rail must be up before the pump");
    assert!(!hw.pump_on(), "pump must be off when the cycle ends");

    // Warm-up plus the configured pump time.
    assert!(hw.delayed_ms >= 30_000);
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
    assert_eq!(report.sleep_us, THREE_HOURS_US);

    let readings = sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Readings { .. }))
        .count();
    assert_eq!(readings, 2, "one read before and one after pumping");
}

// ── Scenario B: dry soil, tank low ───────────────────────────

#[test]
fn dry_soil_low_tank_warns_without_pumping() {
    let (report, hw, _sink) = run(900, 200);

    assert_eq!(report.decision, IrrigationDecision::WarnLowWater);
    assert!(!hw.pump_ever_on());
    assert!(hw.led_ever_on());
    assert!(report.moisture_after.is_none());
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
}

// ── Scenario C: wet soil ─────────────────────────────────────

#[test]
fn wet_soil_skips_but_still_schedules() {
    let (report, hw, sink) = run(500, 450);

    assert_eq!(report.decision, IrrigationDecision::Skip);
    assert!(!hw.pump_ever_on());
    assert!(!hw.led_ever_on());
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::CycleCompleted(r)) if r.decision == IrrigationDecision::Skip
    ));
}

#[test]
fn connected_cycle_syncs_the_clock_once() {
    let bus = EventBus::new();
    let factory = factory(500, 450);
    let mut service = IrrigationService::new(headless(), &factory, ScriptedStation::new(&bus), MemStorage::new(), &bus);
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert_eq!(report.network, NetworkStatus::Connected);
    assert!(report.clock_synced);
    assert_eq!(clock.syncs, 1);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::StageChanged {
            to: StateId::TimeSynced,
            ..
        }
    )));
}

// ── Degraded networking ──────────────────────────────────────

#[test]
fn exhausted_retries_still_irrigate() {
    let bus = EventBus::new();
    let factory = factory(900, 450);
    let mut service = IrrigationService::new(
        headless(),
        &factory,
        ScriptedStation::refusing(&bus, u32::MAX),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert_eq!(report.network, NetworkStatus::Failed);
    assert!(!report.clock_synced);
    assert_eq!(clock.syncs, 0);
    assert_eq!(report.decision, IrrigationDecision::Irrigate);
    assert_eq!(service.wifi().port().connects, u32::from(SystemConfig::default().wifi_max_retries));
    assert_eq!(sink.network_unavailable(), 1);
}

#[test]
fn unopenable_store_never_starts_networking() {
    let bus = EventBus::new();
    let factory = factory(500, 450);
    let mut service = IrrigationService::new(
        headless(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::unopenable(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());
    let supplied = Credentials::new("garden-ap", "hunter22hunter22").unwrap();

    let report = service
        .run_cycle(Some(&supplied), &mut hw, &mut clock, &mut sink)
        .unwrap();

    assert_eq!(report.network, NetworkStatus::Disabled);
    assert_eq!(service.wifi().port().stack_inits, 0);
    assert_eq!(service.wifi().port().connects, 0);
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
}

#[test]
fn full_queue_still_ends_in_sleep() {
    let bus = EventBus::new();
    for _ in 0..EVENT_QUEUE_CAP {
        assert!(bus.post(Event::SETTINGS));
    }
    let factory = factory(900, 450);
    let mut service = IrrigationService::new(
        headless(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::unopenable(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert_eq!(report.network, NetworkStatus::Disabled);
    assert_eq!(report.decision, IrrigationDecision::Irrigate);
    assert_eq!(service.stage(), StateId::Scheduled);
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
    assert!(bus.is_empty());
}

#[test]
fn silent_network_times_out_and_irrigates() {
    let bus = EventBus::new();
    let factory = factory(900, 450);
    let mut service = IrrigationService::new(
        headless(),
        &factory,
        ScriptedStation::silent(&bus),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert_eq!(report.network, NetworkStatus::TimedOut);
    assert_eq!(report.decision, IrrigationDecision::Irrigate);
    let deadline_ms = u64::from(SystemConfig::default().network_timeout_secs) * 1_000;
    assert!(hw.delayed_ms >= deadline_ms);
}

#[test]
fn failed_time_sync_keeps_going() {
    let bus = EventBus::new();
    let factory = factory(500, 450);
    let mut service = IrrigationService::new(headless(), &factory, ScriptedStation::new(&bus), MemStorage::new(), &bus);
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::failing_sync(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert_eq!(report.network, NetworkStatus::Connected);
    assert!(!report.clock_synced);
    assert_eq!(clock.syncs, 1);
    assert_eq!(report.sleep_us, THREE_HOURS_US);
}

#[test]
fn supplied_credentials_are_stored_and_used() {
    let bus = EventBus::new();
    let factory = factory(500, 450);
    let mut service = IrrigationService::new(headless(), &factory, ScriptedStation::new(&bus), MemStorage::new(), &bus);
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());
    let supplied = Credentials::new("garden-ap", "hunter22hunter22").unwrap();

    service
        .run_cycle(Some(&supplied), &mut hw, &mut clock, &mut sink)
        .unwrap();

    let storage = service.credentials().storage();
    assert_eq!(storage.get_str("WIFI_SSID").as_deref(), Some("garden-ap"));
    assert_eq!(storage.get_str("WIFI_BSSID").as_deref(), Some("hunter22hunter22"));
    let applied = service.wifi().port().applied.as_ref().expect("station configured");
    assert_eq!(applied.network_id.as_str(), "garden-ap");
}

// ── Hardware faults ──────────────────────────────────────────

#[test]
fn bus_bring_up_failure_is_fatal() {
    let bus = EventBus::new();
    let factory = BusResourceFactory::new(Default::default(), ScriptedBus::failing(0x103), ScriptedAdc::with(900, 450));
    let mut service = IrrigationService::new(
        SystemConfig::default(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let err = service
        .run_cycle(None, &mut hw, &mut clock, &mut sink)
        .expect_err("bus bring-up must abort the cycle");

    assert_eq!(err, Error::Init(InitError::BusBringUp(0x103)));
    assert!(err.is_fatal());
    assert_eq!(hw.calls.last(), Some(&ActuatorCall::AllOff));
    assert!(!hw.pump_ever_on());
    assert_eq!(hw.slept_us, None);
}

#[test]
fn adc_unit_failure_is_fatal() {
    let bus = EventBus::new();
    let adc = ScriptedAdc {
        unit_error: Some(0x102),
        ..ScriptedAdc::with(900, 450)
    };
    let factory = BusResourceFactory::new(Default::default(), ScriptedBus::default(), adc);
    let mut service = IrrigationService::new(headless(), &factory, ScriptedStation::new(&bus), MemStorage::new(), &bus);
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let err = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap_err();

    assert!(matches!(err, Error::Init(InitError::AdcUnit { code: 0x102, .. })));
    assert!(!hw.sensor_powered());
    assert_eq!(hw.slept_us, None);
}

#[test]
fn failed_conversion_reuses_last_sample() {
    let bus = EventBus::new();
    let mut adc = ScriptedAdc::with(900, 450);
    adc.values.insert(irrigation_node::pins::MOISTURE_ADC_CHANNEL, Err(0x107));
    let factory = BusResourceFactory::new(Default::default(), ScriptedBus::default(), adc);
    let mut service = IrrigationService::new(headless(), &factory, ScriptedStation::new(&bus), MemStorage::new(), &bus);
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    // Nothing good was ever read: raw 0 on the inverted scale is fully wet.
    assert_eq!(report.moisture.raw, 0);
    assert_eq!(report.decision, IrrigationDecision::Skip);
    assert_eq!(hw.slept_us, Some(THREE_HOURS_US));
}

// ── Display ──────────────────────────────────────────────────

#[test]
fn display_shows_readings() {
    let bus = EventBus::new();
    let i2c = ScriptedBus::with_devices(&[irrigation_node::pins::LCD_I2C_ADDRESS]);
    let frames = i2c.frames.clone();
    let bring_ups = i2c.bring_ups.clone();
    let factory = BusResourceFactory::new(Default::default(), i2c, ScriptedAdc::with(500, 450));
    let mut service = IrrigationService::new(
        SystemConfig::default(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert!(service.has_display());
    assert_eq!(*bring_ups.borrow(), 1);
    assert!(frames.borrow().len() > 20);
    assert!(frames.borrow().iter().all(|(addr, _)| *addr == 0x27));
}

#[test]
fn missing_display_runs_headless() {
    let bus = EventBus::new();
    let factory = factory(900, 450);
    let mut service = IrrigationService::new(
        SystemConfig::default(),
        &factory,
        ScriptedStation::new(&bus),
        MemStorage::new(),
        &bus,
    );
    let (mut hw, mut clock, mut sink) = (MockHardware::new(), FixedClock::noon(), RecordingSink::new());

    let report = service.run_cycle(None, &mut hw, &mut clock, &mut sink).unwrap();

    assert!(!service.has_display());
    assert_eq!(report.decision, IrrigationDecision::Irrigate);
}
