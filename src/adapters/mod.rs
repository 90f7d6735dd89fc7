//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                   |
//! |------------|--------------------|-------------------------------|
//! | `adc`      | AdcPort            | ESP32 ADC oneshot + cali      |
//! | `hardware` | ActuatorPort       | ESP32 GPIO (pump, rail, LED)  |
//! |            | DelayNs            | FreeRTOS delay                |
//! |            | PowerPort          | Deep sleep                    |
//! | `i2c`      | BusPort            | ESP-IDF `i2c_master` bus      |
//! | `log_sink` | EventSink          | Serial log output             |
//! | `nvs`      | ConfigPort         | NVS / in-memory store         |
//! |            | StoragePort        |                               |
//! | `time`     | ClockPort          | SNTP + system clock           |
//! | `wifi`     | ConnectivityPort   | ESP-IDF WiFi STA              |

pub mod adc;
pub mod hardware;
pub mod i2c;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
