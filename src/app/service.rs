//! Irrigation service: the hexagonal core of one wake cycle.
//!
//! [`IrrigationService`] owns the cycle FSM, the sensor pipeline, the Wi-Fi
//! manager and the credential store.  All I/O flows through port traits
//! injected at construction or at the call site, so the whole cycle runs
//! against mock adapters in tests.
//!
//! ```text
//!   EventBus ──▶ EventRouter ──┬── Route::Wifi  ──▶ WifiManager ──▶ (SYNC_TIME | Failed)
//!                              └── Route::Cycle ──▶ SYNC_TIME ──▶ ClockPort::sync ──▶ IRRIGATE
//!                                                   IRRIGATE  ──▶ sense · decide · act ──▶ sleep
//!
//!   ActuatorPort + DelayNs + PowerPort ◀── FSM output commands
//!   EventSink ◀── StageChanged · Readings · DecisionMade · CycleCompleted
//! ```
//!
//! Every path through [`IrrigationService::run_cycle`] that does not hit a
//! fatal bring-up error ends in a sleep request.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::app::credentials::{CredentialStore, Credentials};
use crate::app::events::{AppEvent, CycleReport};
use crate::app::ports::{
    ActuatorPort, AdcPort, BusPort, ClockPort, ConnectivityPort, EventSink, PowerPort, StoragePort,
};
use crate::app::wifi::{WifiManager, WifiOutcome};
use crate::config::SystemConfig;
use crate::control::{DecisionThresholds, IrrigationDecision, decide};
use crate::drivers::factory::BusResourceFactory;
use crate::drivers::lcd::{self, Lcd};
use crate::error::Result;
use crate::events::{Event, EventBus, EventRouter, IrrigationEvent, Route};
use crate::fsm::context::{CycleContext, NetworkStatus};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::scheduler::{self, ScheduleTarget};
use crate::sensors::{SensorPipeline, SensorReading};

/// Idle wait between event-queue polls (ms).
pub const EVENT_POLL_MS: u32 = 50;

// ───────────────────────────────────────────────────────────────
// IrrigationService
// ───────────────────────────────────────────────────────────────

pub struct IrrigationService<'f, 'b, B, A, N, S>
where
    B: BusPort,
    A: AdcPort,
    N: ConnectivityPort,
    S: StoragePort,
{
    factory: &'f BusResourceFactory<B, A>,
    sensors: SensorPipeline<'f, B, A>,
    wifi: WifiManager<'b, N>,
    credentials: CredentialStore<S>,
    bus: &'b EventBus,
    router: EventRouter,
    fsm: Fsm,
    ctx: CycleContext,
    thresholds: DecisionThresholds,
    target: ScheduleTarget,
    display: Option<Lcd<'f>>,
    display_checked: bool,
    /// Set once irrigation is due; the idle branch acts on it if the
    /// `IRRIGATE` event never made it onto the queue.
    irrigate_pending: bool,
    moisture_after: Option<SensorReading>,
    water_after: Option<SensorReading>,
}

impl<'f, 'b, B, A, N, S> IrrigationService<'f, 'b, B, A, N, S>
where
    B: BusPort,
    A: AdcPort,
    N: ConnectivityPort,
    S: StoragePort,
{
    /// Construct the service for one wake cycle.
    ///
    /// Does **not** touch hardware; everything is brought up lazily by
    /// [`run_cycle`](Self::run_cycle).
    pub fn new(
        config: SystemConfig,
        factory: &'f BusResourceFactory<B, A>,
        station: N,
        storage: S,
        bus: &'b EventBus,
    ) -> Self {
        let target = ScheduleTarget::from_config(&config).unwrap_or_else(|| {
            warn!(
                "Irrigation: invalid target {:02}:{:02}, using 18:00",
                config.target_hour, config.target_minute
            );
            ScheduleTarget::default()
        });

        Self {
            factory,
            sensors: SensorPipeline::new(factory, &config),
            wifi: WifiManager::new(station, bus, config.wifi_max_retries),
            credentials: CredentialStore::new(storage),
            bus,
            router: EventRouter::standard(),
            fsm: Fsm::new(build_state_table(), StateId::Booted),
            thresholds: DecisionThresholds::from(&config),
            target,
            ctx: CycleContext::new(config),
            display: None,
            display_checked: false,
            irrigate_pending: false,
            moisture_after: None,
            water_after: None,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current cycle stage.
    pub fn stage(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn context(&self) -> &CycleContext {
        &self.ctx
    }

    pub fn wifi(&self) -> &WifiManager<'b, N> {
        &self.wifi
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    // ── Cycle ─────────────────────────────────────────────────

    /// Run one wake cycle from boot to the sleep request.
    ///
    /// `supplied` are credentials handed in at build or boot time; they are
    /// reconciled with the stored ones before networking starts.  Only a
    /// fatal hardware bring-up error returns `Err`, with every output off
    /// and no sleep requested.
    pub fn run_cycle<H>(
        &mut self,
        supplied: Option<&Credentials>,
        hw: &mut H,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<CycleReport>
    where
        H: ActuatorPort + DelayNs + PowerPort,
    {
        self.fsm.start(&mut self.ctx);
        self.apply_outputs(hw);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));

        self.start_network(supplied, sink);
        self.ctx.network_started = true;
        self.advance(hw, sink);

        let deadline_ms = u32::from(self.ctx.config.network_timeout_secs) * 1_000;
        let mut idle_ms: u32 = 0;

        loop {
            let Some(event) = self.bus.try_next() else {
                if self.irrigate_pending {
                    warn!("Irrigation: IRRIGATE was dropped, irrigating now");
                    return self.finish_cycle(hw, clock, sink);
                }
                if idle_ms >= deadline_ms {
                    if self.ctx.network == NetworkStatus::Pending {
                        warn!(
                            "WiFi: no outcome within {} s, irrigating without network",
                            self.ctx.config.network_timeout_secs
                        );
                        self.go_offline(NetworkStatus::TimedOut, sink);
                        continue;
                    }
                    // Connected, but SYNC_TIME never arrived.
                    warn!("Irrigation: cycle stalled after {} ms idle, irrigating now", idle_ms);
                    return self.finish_cycle(hw, clock, sink);
                }
                hw.delay_ms(EVENT_POLL_MS);
                idle_ms = idle_ms.saturating_add(EVENT_POLL_MS);
                continue;
            };

            match self.router.route(&event) {
                Some(Route::Wifi) => {
                    if let Some(outcome) = self.wifi.handle_event(&event) {
                        self.on_wifi_outcome(outcome, sink);
                    }
                }
                Some(Route::Cycle) => match event {
                    Event::Irrigation(IrrigationEvent::SyncTime) => {
                        self.sync_time(clock);
                        self.advance(hw, sink);
                    }
                    Event::Irrigation(IrrigationEvent::Irrigate) => {
                        return self.finish_cycle(hw, clock, sink);
                    }
                    Event::Irrigation(IrrigationEvent::Settings) => {
                        info!("Irrigation: settings requested, nothing to change on this node");
                    }
                    other => debug!("Irrigation: ignoring {:?}", other),
                },
                None => {}
            }
        }
    }

    // ── Network ───────────────────────────────────────────────

    fn start_network(&mut self, supplied: Option<&Credentials>, sink: &mut impl EventSink) {
        let credentials = self.credentials.reconcile(supplied);
        let started = self
            .wifi
            .configure(&credentials, &mut self.credentials)
            .and_then(|()| self.wifi.start());

        match started {
            Ok(()) if self.wifi.is_enabled() => {
                info!("WiFi: station started, waiting for events");
            }
            Ok(()) => self.go_offline(NetworkStatus::Disabled, sink),
            Err(e) => {
                error!("WiFi: bring-up failed: {}", e);
                self.go_offline(NetworkStatus::Failed, sink);
            }
        }
    }

    fn on_wifi_outcome(&mut self, outcome: WifiOutcome, sink: &mut impl EventSink) {
        match outcome {
            WifiOutcome::Connected(ip) => {
                info!("WiFi: connected ({})", ip);
                self.ctx.network = NetworkStatus::Connected;
            }
            WifiOutcome::Failed => self.go_offline(NetworkStatus::Failed, sink),
        }
    }

    /// Record the network outcome and irrigate without it.
    fn go_offline(&mut self, status: NetworkStatus, sink: &mut impl EventSink) {
        self.ctx.network = status;
        sink.emit(&AppEvent::NetworkUnavailable(status));
        self.request_irrigation();
    }

    fn request_irrigation(&mut self) {
        if !self.bus.post(Event::IRRIGATE) {
            self.irrigate_pending = true;
        }
    }

    fn sync_time(&mut self, clock: &mut impl ClockPort) {
        let cfg = &self.ctx.config;
        match clock.sync(&cfg.ntp_server, cfg.time_sync_timeout_ms) {
            Ok(()) => {
                info!("SNTP: time synced ({})", clock.now());
                self.ctx.clock_synced = true;
            }
            Err(e) => warn!("SNTP: {}, keeping the current clock", e),
        }
        self.request_irrigation();
    }

    // ── Irrigation ────────────────────────────────────────────

    fn finish_cycle<H>(
        &mut self,
        hw: &mut H,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<CycleReport>
    where
        H: ActuatorPort + DelayNs + PowerPort,
    {
        if let Err(e) = self.irrigate(hw, sink) {
            error!("Irrigation: cycle aborted: {}", e);
            hw.all_off();
            return Err(e);
        }
        Ok(self.schedule(hw, &*clock, sink))
    }

    fn irrigate<H>(&mut self, hw: &mut H, sink: &mut impl EventSink) -> Result<()>
    where
        H: ActuatorPort + DelayNs,
    {
        self.ctx.irrigate_requested = true;
        self.advance(hw, sink);

        self.open_display(hw)?;
        self.show(lcd::MEASURING_LINE, None, hw);

        let warm_up_secs = self.ctx.config.sensor_warm_up_secs;
        debug!("Irrigation: sensor warm-up {} s", warm_up_secs);
        hw.delay_ms(u32::from(warm_up_secs) * 1_000);

        let (moisture, water) = self.read_sensors(hw, sink)?;
        let decision = decide(&moisture, water.as_ref(), &self.thresholds);
        self.ctx.moisture = Some(moisture);
        self.ctx.water = water;
        self.ctx.decision = Some(decision);
        sink.emit(&AppEvent::DecisionMade(decision));
        self.advance(hw, sink);

        match decision {
            IrrigationDecision::Irrigate => {
                let pump_secs = self.ctx.config.pump_on_secs;
                info!("Irrigation: watering for {} s", pump_secs);
                hw.delay_ms(u32::from(pump_secs) * 1_000);
                self.ctx.commands.pump = false;
                self.apply_outputs(hw);

                let (moisture_after, water_after) = self.read_sensors(hw, sink)?;
                self.moisture_after = Some(moisture_after);
                self.water_after = water_after;
                info!("Irrigation: process completed");
            }
            IrrigationDecision::WarnLowWater => {
                warn!("Irrigation: low water level!");
                self.show(lcd::LOW_WATER_LINE, None, hw);
            }
            IrrigationDecision::Skip => {
                info!("Irrigation: no irrigation needed");
            }
        }

        self.ctx.action_done = true;
        self.advance(hw, sink);
        Ok(())
    }

    fn read_sensors(
        &mut self,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(SensorReading, Option<SensorReading>)> {
        let (moisture, water) = self.sensors.read_all()?;
        if self.sensors.any_stale() {
            warn!("Irrigation: deciding on a stale sample");
        }

        let moisture_text = lcd::moisture_line(moisture.percentage);
        let water_text = water.map(|w| lcd::water_line(w.percentage));
        match &water_text {
            Some(w) => info!("Irrigation: {} {}", moisture_text, w),
            None => info!("Irrigation: {}", moisture_text),
        }
        self.show(&moisture_text, water_text.as_deref(), delay);

        sink.emit(&AppEvent::Readings { moisture, water });
        Ok((moisture, water))
    }

    // ── Scheduling ────────────────────────────────────────────

    fn schedule(
        &mut self,
        hw: &mut (impl ActuatorPort + PowerPort),
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> CycleReport {
        let now = clock.now();
        if !scheduler::clock_is_plausible(now) {
            warn!("Sleep: clock was never set ({}), schedule is approximate", now);
        }
        let tz = scheduler::offset_from_minutes(self.ctx.config.utc_offset_minutes);
        let sleep_us = scheduler::next_run_micros(now, self.target, tz);
        let wake = scheduler::wake_time_local(now, sleep_us, tz);
        info!(
            "Sleep: scheduling next run in {} seconds ({})",
            sleep_us / 1_000_000,
            wake.format("%Y-%m-%d %H:%M:%S %:z")
        );

        let report = CycleReport {
            decision: self.ctx.decision.unwrap_or(IrrigationDecision::Skip),
            moisture: self.ctx.moisture.unwrap_or(SensorReading {
                raw: 0,
                percentage: 0.0,
                inverted: false,
            }),
            water: self.ctx.water,
            moisture_after: self.moisture_after,
            water_after: self.water_after,
            network: self.ctx.network,
            clock_synced: self.ctx.clock_synced,
            sleep_us,
        };
        sink.emit(&AppEvent::CycleCompleted(report.clone()));

        hw.all_off();
        hw.deep_sleep(sleep_us);
        report
    }

    // ── Display ───────────────────────────────────────────────

    /// Attach the display once.  Only a failed bus bring-up is an error;
    /// a missing or silent display leaves the cycle headless.
    fn open_display(&mut self, delay: &mut impl DelayNs) -> Result<()> {
        if self.display_checked {
            return Ok(());
        }
        self.display_checked = true;

        let Some(address) = self.ctx.config.display_address else {
            debug!("LCD: none configured");
            return Ok(());
        };
        match self.factory.create_device::<Lcd<'f>>(address, (), delay) {
            Ok(display) => self.display = Some(display),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("LCD: {}, running headless", e),
        }
        Ok(())
    }

    fn show(&mut self, top: &str, bottom: Option<&str>, delay: &mut impl DelayNs) {
        if let Some(display) = self.display.as_mut() {
            display.show(top, bottom, delay);
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Let the FSM take every transition the blackboard allows, then apply
    /// the output commands the stages wrote.
    fn advance(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.fsm.settle(&mut self.ctx, |from, to| {
            sink.emit(&AppEvent::StageChanged { from, to });
        });
        self.apply_outputs(hw);
    }

    /// Translate FSM output commands into port calls.
    fn apply_outputs(&self, hw: &mut impl ActuatorPort) {
        let cmds = self.ctx.commands;
        hw.set_sensor_power(cmds.sensor_power);
        hw.set_pump(cmds.pump);
        hw.set_warning_led(cmds.warning_led);
    }
}
