use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tunnelcore::measurement::{GeneratorConfig, TunnelGeometry};
use tunnelcore::prelude::{TunnelError, TunnelResult};

/// Bounds accepted for the periodic update interval.
pub const MIN_UPDATE_RATE_MS: u64 = 1;
pub const MAX_UPDATE_RATE_MS: u64 = 60_000;

/// Rejects intervals that would produce a runaway or frozen tick loop.
pub fn validate_update_rate(rate_ms: u64) -> TunnelResult<()> {
    if !(MIN_UPDATE_RATE_MS..=MAX_UPDATE_RATE_MS).contains(&rate_ms) {
        return Err(TunnelError::Validation(format!(
            "update rate {} ms out of range {}..={} ms",
            rate_ms, MIN_UPDATE_RATE_MS, MAX_UPDATE_RATE_MS
        )));
    }
    Ok(())
}

/// Generator-side settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub update_rate_ms: u64,
    pub scenario: String,
    pub tunnel: TunnelGeometry,
    pub seed: Option<u64>,
    pub generator: GeneratorConfig,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            update_rate_ms: 100,
            scenario: "standard".to_string(),
            tunnel: TunnelGeometry::default(),
            seed: None,
            generator: GeneratorConfig::default(),
        }
    }
}

/// Relay listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
        }
    }
}

/// Settings for viewing a remote relay.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub url: String,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8081".to_string(),
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: 10,
        }
    }
}

/// Top-level dashboard configuration, loadable from YAML.
///
/// Every section falls back to defaults, so a partial file or none at all
/// still yields a runnable setup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub simulation: SimulationSettings,
    pub relay: RelaySettings,
    pub viewer: ViewerSettings,
}

impl DashboardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config {}", path.display()))?;
        let config: DashboardConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dashboard config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TunnelResult<()> {
        validate_update_rate(self.simulation.update_rate_ms)
    }
}
