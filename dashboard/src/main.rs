use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use driver::config::DashboardConfig;
use driver::runner::SimulationRunner;
use generator::TelemetryGenerator;
use log::warn;
use relay::client::{ClientEvent, RelayClient};
use relay::server::TelemetryRelay;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tunnelcore::export::{self, ExportFormat};
use tunnelcore::protocol::{Envelope, RelayMessage};
use tunnelcore::session::SessionRecorder;
use tunnelcore::store::MeasurementStore;

mod driver;
mod generator;
mod relay;

#[derive(Parser)]
#[command(author, version, about = "Wind tunnel telemetry driver and relay host")]
struct Args {
    /// Load dashboard settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run a fixed number of offline ticks and print a session summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Tick count for offline runs
    #[arg(long, default_value_t = 300)]
    ticks: usize,
    /// Write the offline session to this base filename
    #[arg(long)]
    export: Option<String>,
    /// Export format: csv or json
    #[arg(long, default_value = "csv")]
    format: String,
    /// Host the relay and stream live measurements (Ctrl+C to stop)
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Connect to a remote relay and print incoming frames
    #[arg(long, default_value_t = false)]
    viewer: bool,
    /// Override the relay port
    #[arg(long)]
    port: Option<u16>,
    /// Override the update interval in milliseconds
    #[arg(long)]
    rate_ms: Option<u64>,
    /// Override the viewer target URL
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = args.config.as_ref() {
        DashboardConfig::load(path)?
    } else {
        DashboardConfig::default()
    };
    if let Some(port) = args.port {
        config.relay.port = port;
    }
    if let Some(rate) = args.rate_ms {
        config.simulation.update_rate_ms = rate;
    }
    if let Some(url) = args.url.clone() {
        config.viewer.url = url;
    }
    config.validate()?;

    if args.offline {
        let format = args.format.parse::<ExportFormat>()?;
        run_offline(&config, args.ticks, args.export.as_deref(), format)?;
    }
    if args.serve {
        run_serve(&config).await?;
    }
    if args.viewer {
        run_viewer(&config).await?;
    }

    Ok(())
}

fn run_offline(
    config: &DashboardConfig,
    ticks: usize,
    export_base: Option<&str>,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let settings = &config.simulation;
    let mut generator = match settings.seed {
        Some(seed) => TelemetryGenerator::with_seed(settings.generator.clone(), seed),
        None => TelemetryGenerator::new(settings.generator.clone()),
    };
    generator.set_scenario(&settings.scenario, settings.tunnel);

    let store = MeasurementStore::new();
    let recorder = SessionRecorder::new();
    recorder.start_session("offline run", generator.config().clone(), None, Utc::now())?;

    let step = settings.update_rate_ms as f64 / 1000.0;
    for tick in 0..ticks {
        let measurement = generator.tick(tick as f64 * step, Utc::now());
        store.record(measurement.clone());
        recorder.add_measurement(measurement);
    }

    let session = recorder.end_session(Utc::now())?;
    if let Some(stats) = recorder.stats(session.id, Utc::now()) {
        println!(
            "Offline run -> {} measurements, drag avg {:.3} N, lift avg {:.3} N, wind avg {:.2} m/s",
            stats.data_points, stats.drag_force.avg, stats.lift_force.avg, stats.wind_speed.avg
        );
    }

    if let Some(base) = export_base {
        let text = export::encode(&session.data, format, Utc::now())?;
        let filename = export::export_filename(base, format, Utc::now().date_naive());
        fs::write(&filename, text).with_context(|| format!("writing export {}", filename))?;
        println!("Exported {} measurements to {}", session.data.len(), filename);
    }

    Ok(())
}

async fn run_serve(config: &DashboardConfig) -> anyhow::Result<()> {
    let store = Arc::new(MeasurementStore::new());
    let recorder = Arc::new(SessionRecorder::new());
    let relay = Arc::new(TelemetryRelay::new(config.relay.clone()));

    let addr = relay.start().await.context("starting relay")?;
    println!("Relay listening on ws://{}", addr);

    let runner = SimulationRunner::new(
        config.simulation.clone(),
        store.clone(),
        recorder.clone(),
        relay.clone(),
    );
    recorder.start_session("live run", runner.generator_config(), None, Utc::now())?;
    runner.start()?;
    println!(
        "Streaming measurements every {} ms (Ctrl+C to stop)...",
        config.simulation.update_rate_ms
    );

    let mut control = relay
        .take_control_events()
        .context("control events already taken")?;
    loop {
        tokio::select! {
            event = control.recv() => {
                match event {
                    Some(event) => runner.apply_control(event).await,
                    None => break,
                }
            }
            res = signal::ctrl_c() => {
                res.context("awaiting Ctrl+C to exit")?;
                println!("Shutting down...");
                break;
            }
        }
    }

    let status = relay.status();
    if status.running && status.client_count > 0 {
        println!(
            "Disconnecting {} viewer(s) on port {}...",
            status.client_count, status.port
        );
    }
    runner.stop().await;
    relay.stop().await;

    let (connections, broadcasts, _) = relay.metrics().snapshot();
    println!(
        "Relayed {} frames across {} connection(s)",
        broadcasts, connections
    );

    match recorder.end_session(Utc::now()) {
        Ok(session) => {
            if let Some(stats) = recorder.stats(session.id, Utc::now()) {
                println!(
                    "Recorded session '{}' with {} measurements over {:.1} s",
                    session.name, stats.data_points, stats.duration_secs
                );
            }
        }
        Err(err) => warn!("no session to seal at shutdown: {}", err),
    }

    Ok(())
}

async fn run_viewer(config: &DashboardConfig) -> anyhow::Result<()> {
    let client = RelayClient::new(config.viewer.clone());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (_outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move { client.run(events_tx, outbound_rx, cancel).await }
    });

    println!("Viewing {} (Ctrl+C to stop)...", config.viewer.url);
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(ClientEvent::Connected) => println!("Connected."),
                    Some(ClientEvent::Message(envelope)) => print_envelope(&envelope),
                    None => break,
                }
            }
            res = signal::ctrl_c() => {
                res.context("awaiting Ctrl+C to exit")?;
                cancel.cancel();
                break;
            }
        }
    }

    match worker.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err).context("relay client gave up"),
        Err(err) => warn!("viewer worker ended abnormally: {}", err),
    }
    Ok(())
}

fn print_envelope(envelope: &Envelope) {
    match &envelope.message {
        RelayMessage::Data(m) => println!(
            "[{}] wind {:.2} m/s, drag {:.3} N, lift {:.3} N, Re {:.0}",
            m.timestamp.format("%H:%M:%S%.3f"),
            m.wind_speed,
            m.drag_force,
            m.lift_force,
            m.reynolds_number
        ),
        RelayMessage::Status(status) => println!("[status] {:?}", status),
        RelayMessage::Config(update) => println!("[config] {:?}", update),
        RelayMessage::Command(command) => println!("[command] {:?}", command),
        RelayMessage::Error(error) => println!("[error] {}", error.message),
    }
}
