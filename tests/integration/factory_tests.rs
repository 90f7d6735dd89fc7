//! Shared bus and ADC ownership across the drivers that borrow them.

use crate::mock_hw::{MockHardware, ScriptedAdc, ScriptedBus};

use irrigation_node::config::SystemConfig;
use irrigation_node::drivers::factory::{AdcUnit, BusResourceFactory};
use irrigation_node::drivers::lcd::{self, Lcd};
use irrigation_node::error::{DeviceError, Error};
use irrigation_node::sensors::SensorPipeline;

#[test]
fn display_and_sensors_share_one_bring_up_each() {
    let bus = ScriptedBus::with_devices(&[0x27]);
    let bring_ups = bus.bring_ups.clone();
    let frames = bus.frames.clone();
    let factory = BusResourceFactory::new(Default::default(), bus, ScriptedAdc::with(600, 300));
    let mut delay = MockHardware::new();

    let mut display: Lcd<'_> = factory.create_device(0x27, (), &mut delay).unwrap();
    let again = factory.get_or_create_bus().unwrap();
    assert_eq!(again.port(), 0);
    assert_eq!(*bring_ups.borrow(), 1);

    let mut sensors = SensorPipeline::new(&factory, &SystemConfig::default());
    let (moisture, water) = sensors.read_all().unwrap();
    assert_eq!(moisture.raw, 600);
    assert_eq!(water.map(|w| w.raw), Some(300));
    assert!(factory.get_or_create_adc_unit(AdcUnit::Unit1).unwrap().is_calibrated());

    let before = frames.borrow().len();
    display.show(&lcd::moisture_line(moisture.percentage), None, &mut delay);
    assert!(frames.borrow().len() > before);
    assert_eq!(display.failed_writes(), 0);
}

#[test]
fn silent_address_is_reported_not_fatal() {
    let factory = BusResourceFactory::new(Default::default(), ScriptedBus::default(), ScriptedAdc::default());
    let mut delay = MockHardware::new();

    let err = factory
        .create_device::<Lcd<'_>>(0x3F, (), &mut delay)
        .err()
        .expect("nothing answers at 0x3F");

    assert!(matches!(
        err,
        Error::Device(DeviceError::NotResponding { address: 0x3F, .. })
    ));
    assert!(!err.is_fatal());
}
