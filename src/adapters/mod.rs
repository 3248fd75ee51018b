//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                 |
//! |------------|--------------------|-----------------------------|
//! | `hardware` | RelayPort          | Relay bank GPIO             |
//! |            | SensorPort         | Modbus level sensors        |
//! | `log_sink` | EventSink          | Serial log, per-class target|
//! | `nvs`      | ConfigPort         | NVS / in-memory store       |
//! |            | ControlConfigPort  |                             |
//! | `time`     | MonotonicClock     | ESP32 system timer          |
//! |            | WallClock          | SNTP-set system time        |
//! | `uart`     | SensorBus          | RS-485 UART                 |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
