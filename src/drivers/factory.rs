//! Shared hardware resource factory.
//!
//! One I2C master bus and up to two ADC oneshot units exist per chip.
//! Creating any of them twice either fails in the driver or silently resets
//! state another device depends on, so every device and sensor obtains its
//! handle here.  The factory is built once in `main` and passed by reference;
//! the handles it lends borrow it, so no device outlives the shared resource.
//!
//! ```text
//!   BusResourceFactory ──┬── BusHandle (lazy, once) ──▶ DeviceHandle ──▶ Lcd
//!                        ├── ADC1 unit (lazy, once) ──▶ AdcChannel  ──▶ AnalogSensor
//!                        └── ADC2 unit (lazy, once) ──▶ AdcChannel
//! ```
//!
//! There is no teardown path: handles live until the process ends, which on
//! this node is the deep-sleep request.

use core::cell::{OnceCell, RefCell};
use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{AdcPort, BusPort, RawDevice};
use crate::config::BusConfig;
use crate::error::{DeviceError, InitError, Result, SensorError};

/// Bus probe timeout (ms).
pub const PROBE_TIMEOUT_MS: u32 = 10_000;

// ---------------------------------------------------------------------------
// Identities and handles
// ---------------------------------------------------------------------------

/// Physical ADC unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdcUnit {
    Unit1,
    Unit2,
}

impl AdcUnit {
    const fn index(self) -> usize {
        match self {
            Self::Unit1 => 0,
            Self::Unit2 => 1,
        }
    }
}

impl fmt::Display for AdcUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit1 => write!(f, "ADC1"),
            Self::Unit2 => write!(f, "ADC2"),
        }
    }
}

/// Proof that the shared bus has been brought up.
#[derive(Debug, PartialEq, Eq)]
pub struct BusHandle {
    port: u8,
    scl_hz: u32,
}

impl BusHandle {
    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn scl_hz(&self) -> u32 {
        self.scl_hz
    }
}

/// A brought-up ADC unit and whether it has a calibration scheme.
#[derive(Debug, PartialEq, Eq)]
pub struct AdcUnitHandle {
    unit: AdcUnit,
    calibrated: bool,
}

impl AdcUnitHandle {
    pub fn unit(&self) -> AdcUnit {
        self.unit
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }
}

// ---------------------------------------------------------------------------
// Borrowed access used by lent handles
// ---------------------------------------------------------------------------

/// Transmit access to the shared bus.  Implemented by the factory.
pub trait DeviceBus {
    fn transmit(&self, device: RawDevice, bytes: &[u8], timeout_ms: u32)
    -> core::result::Result<(), i32>;
}

/// Read access to the shared ADC units.  Implemented by the factory.
pub trait AdcAccess {
    fn read_raw(&self, unit: AdcUnit, channel: u8) -> core::result::Result<u16, i32>;
    fn read_millivolts(&self, unit: AdcUnit, channel: u8) -> core::result::Result<u16, i32>;
}

/// Non-owning sub-handle for one device attached to the shared bus.
pub struct DeviceHandle<'f> {
    bus: &'f dyn DeviceBus,
    raw: RawDevice,
    address: u16,
}

impl DeviceHandle<'_> {
    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn write(&self, bytes: &[u8], timeout_ms: u32) -> core::result::Result<(), i32> {
        self.bus.transmit(self.raw, bytes, timeout_ms)
    }
}

/// Non-owning handle bound to one channel of a shared ADC unit.
pub struct AdcChannel<'f> {
    adc: &'f dyn AdcAccess,
    unit: AdcUnit,
    channel: u8,
    calibrated: bool,
}

impl AdcChannel<'_> {
    pub fn unit(&self) -> AdcUnit {
        self.unit
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn read_raw(&self) -> core::result::Result<u16, SensorError> {
        self.adc
            .read_raw(self.unit, self.channel)
            .map_err(SensorError::AdcReadFailed)
    }

    /// Calibrated millivolts.  Raw-only units answer `NotCalibrated`.
    pub fn read_millivolts(&self) -> core::result::Result<u16, SensorError> {
        if !self.calibrated {
            return Err(SensorError::NotCalibrated);
        }
        self.adc
            .read_millivolts(self.unit, self.channel)
            .map_err(SensorError::AdcReadFailed)
    }
}

/// A driver that binds to a device handle lent by the factory.
pub trait BusDevice<'f>: Sized {
    /// Constructor arguments beyond the handle.
    type Args;

    fn bind(handle: DeviceHandle<'f>, args: Self::Args) -> Result<Self>;

    /// Bring the device into a usable state after binding.
    fn initialize(&mut self, delay: &mut impl DelayNs) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct BusResourceFactory<B: BusPort, A: AdcPort> {
    bus_config: BusConfig,
    bus_port: RefCell<B>,
    bus: OnceCell<BusHandle>,
    adc_port: RefCell<A>,
    units: [OnceCell<AdcUnitHandle>; 2],
}

impl<B: BusPort, A: AdcPort> BusResourceFactory<B, A> {
    pub fn new(bus_config: BusConfig, bus_port: B, adc_port: A) -> Self {
        Self {
            bus_config,
            bus_port: RefCell::new(bus_port),
            bus: OnceCell::new(),
            adc_port: RefCell::new(adc_port),
            units: [OnceCell::new(), OnceCell::new()],
        }
    }

    pub fn bus_config(&self) -> &BusConfig {
        &self.bus_config
    }

    /// The shared bus, brought up on first call.
    ///
    /// A bring-up failure is fatal; a later call retries it.
    pub fn get_or_create_bus(&self) -> Result<&BusHandle> {
        if let Some(handle) = self.bus.get() {
            return Ok(handle);
        }

        let cfg = self.bus_config;
        self.bus_port
            .borrow_mut()
            .bring_up(&cfg)
            .map_err(InitError::BusBringUp)?;
        info!(
            "Bus: I2C{} up (SDA={}, SCL={}, {} Hz)",
            cfg.port, cfg.sda_gpio, cfg.scl_gpio, cfg.scl_hz
        );

        Ok(self.bus.get_or_init(|| BusHandle {
            port: cfg.port,
            scl_hz: cfg.scl_hz,
        }))
    }

    /// Probe `address`, attach it to the shared bus, then bind and
    /// initialise driver `T`.
    pub fn create_device<'f, T: BusDevice<'f>>(
        &'f self,
        address: u16,
        args: T::Args,
        delay: &mut impl DelayNs,
    ) -> Result<T> {
        let scl_hz = self.get_or_create_bus()?.scl_hz;

        let raw = {
            let mut port = self.bus_port.borrow_mut();
            port.probe(address, PROBE_TIMEOUT_MS)
                .map_err(|code| DeviceError::NotResponding { address, code })?;
            port.attach(address, scl_hz)
                .map_err(|code| DeviceError::AttachFailed { address, code })?
        };
        info!("Bus: device 0x{:02X} attached", address);

        let mut device = T::bind(
            DeviceHandle {
                bus: self,
                raw,
                address,
            },
            args,
        )?;
        device.initialize(delay)?;
        Ok(device)
    }

    /// The ADC unit, brought up with its calibration scheme on first call.
    pub fn get_or_create_adc_unit(&self, unit: AdcUnit) -> Result<&AdcUnitHandle> {
        let slot = &self.units[unit.index()];
        if let Some(handle) = slot.get() {
            return Ok(handle);
        }

        let mut port = self.adc_port.borrow_mut();
        port.bring_up_unit(unit)
            .map_err(|code| InitError::AdcUnit { unit, code })?;

        let calibrated = match port.create_calibration(unit) {
            Ok(true) => true,
            Ok(false) => {
                warn!("ADC: {unit} calibration scheme not available, raw-only");
                false
            }
            Err(rc) => {
                warn!("ADC: {unit} calibration failed (rc={rc}), raw-only");
                false
            }
        };
        info!("ADC: {unit} up (calibrated={calibrated})");

        Ok(slot.get_or_init(|| AdcUnitHandle { unit, calibrated }))
    }

    /// Channel-bound handle on a shared ADC unit.
    pub fn create_adc_channel<'f>(&'f self, unit: AdcUnit, channel: u8) -> Result<AdcChannel<'f>> {
        let calibrated = self.get_or_create_adc_unit(unit)?.calibrated;

        self.adc_port
            .borrow_mut()
            .configure_channel(unit, channel)
            .map_err(|code| InitError::AdcChannel {
                unit,
                channel,
                code,
            })?;

        Ok(AdcChannel {
            adc: self,
            unit,
            channel,
            calibrated,
        })
    }
}

impl<B: BusPort, A: AdcPort> DeviceBus for BusResourceFactory<B, A> {
    fn transmit(
        &self,
        device: RawDevice,
        bytes: &[u8],
        timeout_ms: u32,
    ) -> core::result::Result<(), i32> {
        self.bus_port.borrow_mut().transmit(device, bytes, timeout_ms)
    }
}

impl<B: BusPort, A: AdcPort> AdcAccess for BusResourceFactory<B, A> {
    fn read_raw(&self, unit: AdcUnit, channel: u8) -> core::result::Result<u16, i32> {
        self.adc_port.borrow_mut().read_raw(unit, channel)
    }

    fn read_millivolts(&self, unit: AdcUnit, channel: u8) -> core::result::Result<u16, i32> {
        self.adc_port.borrow_mut().read_millivolts(unit, channel)
    }
}
