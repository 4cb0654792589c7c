pub mod client;
pub mod metrics;
pub mod server;

pub use client::{ClientEvent, RelayClient};
pub use metrics::{RelayMetrics, RelayStatus};
pub use server::{ControlEvent, TelemetryRelay};
