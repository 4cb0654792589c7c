pub mod config;
pub mod runner;

pub use config::DashboardConfig;
pub use runner::SimulationRunner;
