use crate::driver::config::{validate_update_rate, SimulationSettings};
use crate::generator::TelemetryGenerator;
use crate::relay::server::{ControlEvent, TelemetryRelay};
use chrono::Utc;
use log::{info, warn};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tunnelcore::measurement::GeneratorConfig;
use tunnelcore::prelude::{TunnelError, TunnelResult};
use tunnelcore::protocol::CommandPayload;
use tunnelcore::session::SessionRecorder;
use tunnelcore::store::MeasurementStore;

struct TickerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives the generator on a fixed interval and fans each measurement out
/// to the live store, the session recorder, and the relay.
pub struct SimulationRunner {
    settings: SimulationSettings,
    generator: Arc<Mutex<TelemetryGenerator>>,
    store: Arc<MeasurementStore>,
    recorder: Arc<SessionRecorder>,
    relay: Arc<TelemetryRelay>,
    ticker: Mutex<Option<TickerHandle>>,
}

impl SimulationRunner {
    pub fn new(
        settings: SimulationSettings,
        store: Arc<MeasurementStore>,
        recorder: Arc<SessionRecorder>,
        relay: Arc<TelemetryRelay>,
    ) -> Self {
        let mut generator = match settings.seed {
            Some(seed) => TelemetryGenerator::with_seed(settings.generator.clone(), seed),
            None => TelemetryGenerator::new(settings.generator.clone()),
        };
        generator.set_scenario(&settings.scenario, settings.tunnel);

        Self {
            settings,
            generator: Arc::new(Mutex::new(generator)),
            store,
            recorder,
            relay,
            ticker: Mutex::new(None),
        }
    }

    /// Spawns the tick loop; a second call while running is a no-op.
    ///
    /// The interval is validated before any state changes.
    pub fn start(&self) -> TunnelResult<()> {
        validate_update_rate(self.settings.update_rate_ms)?;

        let mut slot = self
            .ticker
            .lock()
            .map_err(|_| TunnelError::Internal("runner state lock poisoned".to_string()))?;
        if slot.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let generator = self.generator.clone();
        let store = self.store.clone();
        let recorder = self.recorder.clone();
        let relay = self.relay.clone();
        let rate = Duration::from_millis(self.settings.update_rate_ms);

        let task = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(rate);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed().as_secs_f64();
                        let measurement = match generator.lock() {
                            Ok(mut generator) => generator.tick(elapsed, Utc::now()),
                            Err(_) => break,
                        };
                        store.record(measurement.clone());
                        recorder.add_measurement(measurement.clone());
                        relay.broadcast_data(&measurement);
                    }
                    _ = child.cancelled() => {
                        info!("simulation loop shutting down");
                        break;
                    }
                }
            }
        });

        *slot = Some(TickerHandle { cancel, task });
        info!(
            "simulation running every {} ms",
            self.settings.update_rate_ms
        );
        Ok(())
    }

    /// Stops the tick loop and waits it out; no tick lands afterwards.
    /// Idempotent.
    pub async fn stop(&self) {
        let handle = match self.ticker.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(err) = handle.task.await {
                warn!("simulation loop ended abnormally: {}", err);
            }
            info!("simulation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        self.generator
            .lock()
            .map(|generator| generator.config().clone())
            .unwrap_or_default()
    }

    /// Applies one control event surfaced by the relay.
    pub async fn apply_control(&self, event: ControlEvent) {
        match event {
            ControlEvent::Command(CommandPayload::StartSimulation) => {
                if self.is_running() {
                    warn!("start command ignored, simulation already running");
                } else if let Err(err) = self.start() {
                    warn!("start command rejected: {}", err);
                }
            }
            ControlEvent::Command(CommandPayload::StopSimulation) => self.stop().await,
            ControlEvent::Command(CommandPayload::ClearHistory) => {
                self.store.clear_history();
                info!("history cleared by remote command");
            }
            ControlEvent::ConfigUpdate(update) => {
                if let Ok(mut generator) = self.generator.lock() {
                    generator.apply_update(&update);
                    info!("configuration updated by remote viewer");
                }
            }
        }
    }
}
