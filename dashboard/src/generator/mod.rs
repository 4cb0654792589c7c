pub mod synth;

pub use synth::TelemetryGenerator;
