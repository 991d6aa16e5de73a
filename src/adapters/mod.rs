//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements            | Connects to                 |
//! |----------------|-----------------------|-----------------------------|
//! | `log_sink`     | EventSink             | Serial log output           |
//! | `notifier`     | Notifier              | Outbox + notifier worker    |
//! |                | NotificationTransport | HTTP POST to the webhook    |
//! | `nvs`          | ConfigPort            | NVS / in-memory store       |
//! | `reader`       | (event producer)      | Tag reader on a UART        |
//! | `storage`      | -                     | SPIFFS partition            |
//! | `table_source` | TableSource           | HTTPS download / SPIFFS file|
//! | `wifi`         | ConnectivityPort      | ESP-IDF WiFi STA            |

pub mod log_sink;
pub mod notifier;
pub mod nvs;
pub mod reader;
pub mod storage;
pub mod table_source;
pub(super) mod utils;
pub mod wifi;
