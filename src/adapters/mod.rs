//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                  | Connects to                 |
//! |-------------|-----------------------------|-----------------------------|
//! | `nvs`       | ConfigPort, StoragePort     | NVS / in-memory store       |
//! | `time`      | monotonic clock             | ESP32 system timer          |
//! | `websocket` | SocketTransport             | ESP-IDF WebSocket client    |
//! | `wifi`      | LinkPort, ProvisioningPort  | ESP-IDF WiFi + HTTP server  |
//!
//! The gauge, sensor and panel ports are implemented directly by their chip
//! drivers in [`drivers`](crate::drivers).

pub mod nvs;
pub mod time;
pub mod websocket;
pub mod wifi;
