//! Irrigation node firmware, main entry point.
//!
//! One wake cycle per boot: bring up the node, run the cycle, deep sleep
//! until the next scheduled run.  A cold boot and a timer wake take the
//! same path.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     LogEventSink   NvsAdapter    SntpClock    │
//! │  (Actuator+Delay+    (EventSink)    (Config+      (ClockPort)  │
//! │   Power)                             Storage)                  │
//! │  I2cMasterAdapter    AdcOneshotAdapter    WifiAdapter          │
//! │  (BusPort)           (AdcPort)            (ConnectivityPort)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        IrrigationService (cycle orchestration)         │    │
//! │  │  FSM · SensorPipeline · WifiManager · CredentialStore  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  BusResourceFactory (shared I2C + ADC) · EventBus (static)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use irrigation_node::adapters::adc::AdcOneshotAdapter;
use irrigation_node::adapters::hardware::HardwareAdapter;
use irrigation_node::adapters::i2c::I2cMasterAdapter;
use irrigation_node::adapters::log_sink::LogEventSink;
use irrigation_node::adapters::nvs::NvsAdapter;
use irrigation_node::adapters::time::SntpClock;
use irrigation_node::adapters::wifi::WifiAdapter;
use irrigation_node::app::credentials::Credentials;
use irrigation_node::app::ports::{ClockPort, ConfigPort, PowerPort, StoragePort};
use irrigation_node::app::service::IrrigationService;
use irrigation_node::config::SystemConfig;
use irrigation_node::drivers::factory::BusResourceFactory;
use irrigation_node::error::Error;
use irrigation_node::events::EventBus;
use irrigation_node::scheduler::{self, ScheduleTarget};

/// Reached from Wi-Fi and IP event-loop callbacks, which get no context.
static EVENT_BUS: EventBus = EventBus::new();

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("╔══════════════════════════════════════╗");
    info!("║  Irrigation node v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut config_store = NvsAdapter::new();
    if let Err(e) = config_store.init() {
        warn!("NVS init failed ({}), running with defaults", e);
    }
    let config = match config_store.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Outputs, shared bus and ADC ────────────────────────
    let mut hw = HardwareAdapter::new(&config).map_err(Error::from)?;

    #[cfg_attr(target_os = "espidf", allow(unused_mut))]
    let mut i2c = I2cMasterAdapter::new();
    #[cfg_attr(target_os = "espidf", allow(unused_mut))]
    let mut adc = AdcOneshotAdapter::new();
    #[cfg(not(target_os = "espidf"))]
    simulate_garden(&config, &mut i2c, &mut adc);

    let factory = BusResourceFactory::new(config.bus, i2c, adc);

    // ── 4. Network station ────────────────────────────────────
    #[cfg(target_os = "espidf")]
    let station = {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::hal::peripherals::Peripherals;
        use esp_idf_svc::nvs::EspDefaultNvsPartition;

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = match EspDefaultNvsPartition::take() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("WiFi: NVS partition unavailable ({}), no calibration data", e);
                None
            }
        };
        WifiAdapter::new(&EVENT_BUS, peripherals.modem, sysloop, nvs_partition)
    };
    #[cfg(not(target_os = "espidf"))]
    let station = WifiAdapter::new(&EVENT_BUS);

    // ── 5. Run the cycle ──────────────────────────────────────
    let mut clock = SntpClock::new();
    let mut sink = LogEventSink::new();
    let mut service = IrrigationService::new(
        config.clone(),
        &factory,
        station,
        NvsAdapter::new(),
        &EVENT_BUS,
    );

    let supplied = Credentials::from_build_env();
    match service.run_cycle(supplied.as_ref(), &mut hw, &mut clock, &mut sink) {
        Ok(report) => {
            info!(
                "Cycle done: {} (network {})",
                report.decision.name(),
                report.network.name()
            );
        }
        Err(e) => {
            // Outputs are already off; try again at the next scheduled run.
            error!("Cycle failed: {}", e);
            let target = ScheduleTarget::from_config(&config).unwrap_or_default();
            let tz = scheduler::offset_from_minutes(config.utc_offset_minutes);
            hw.deep_sleep(scheduler::next_run_micros(clock.now(), target, tz));
        }
    }

    Ok(())
}

/// Host run: a dry bed, a half-full tank and a display on the bus.
#[cfg(not(target_os = "espidf"))]
fn simulate_garden(config: &SystemConfig, i2c: &mut I2cMasterAdapter, adc: &mut AdcOneshotAdapter) {
    adc.sim_set_raw(config.moisture.unit, config.moisture.channel, 900);
    adc.sim_set_raw(config.water.unit, config.water.channel, 450);
    if let Some(address) = config.display_address {
        i2c.sim_add_device(address);
    }
}
