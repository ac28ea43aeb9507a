//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                       |
//! |-------------|-------------------|-----------------------------------|
//! | `hardware`  | LimitSensorPort   | limit switch GPIOs                |
//! |             | StepperPort       | stepper worker thread             |
//! |             | LedStripPort      | WS2812 strip on RMT               |
//! | `log_sink`  | EventSink         | Serial log output                 |
//! | `nvs`       | ConfigPort        | NVS / in-memory store             |
//! | `wifi`      | (station)         | ESP-IDF WiFi STA                  |
//! | `http`      | EventSink         | EspHttpServer + WebSocket clients |
//! | `directory` | AnnouncePort      | HTTPS POST to the flag directory  |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub(super) mod utils;
pub mod wifi;

#[cfg(target_os = "espidf")]
pub mod directory;
#[cfg(target_os = "espidf")]
pub mod http;
