pub mod config;
pub mod record;

pub use config::{ConfigUpdate, GeneratorConfig, ModelType, TunnelGeometry};
pub use record::{ConfigSnapshot, EnvironmentalFactors, Measurement, SensorReadings, Vec3};
