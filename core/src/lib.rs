//! Measurement, session, and relay-protocol core for the wind tunnel dashboard.
//!
//! The modules cover the data path of the dashboard without any I/O of their
//! own: a canonical measurement record, bounded live/session stores, export
//! encoders, and the typed wire protocol spoken by the relay.

pub mod aero;
pub mod export;
pub mod measurement;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod store;

pub use measurement::{GeneratorConfig, Measurement, ModelType};
pub use prelude::{TunnelError, TunnelResult};
