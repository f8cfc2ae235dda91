//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to                      |
//! |------------|------------------|----------------------------------|
//! | `hardware` | SpeedInputPort   | Pulse hand-off, GPS UART         |
//! |            | AlarmOutputPort  | Alarm light GPIO + flash gptimer |
//! |            | StatusLightPort  | Status light GPIO                |
//! | `log_sink` | EventSink        | Serial log output                |
//! | `nvs`      | ConfigPort       | NVS / in-memory store            |
//! |            | StoragePort      |                                  |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
