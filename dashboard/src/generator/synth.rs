use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tunnelcore::aero;
use tunnelcore::measurement::{
    ConfigSnapshot, ConfigUpdate, EnvironmentalFactors, GeneratorConfig, Measurement,
    SensorReadings, TunnelGeometry, Vec3,
};

/// Synthesizes plausible wind tunnel measurements tick by tick.
///
/// The generator is total: any sanitized configuration yields finite
/// readings, including still air. The caller owns elapsed time and
/// timestamps, so a seeded generator replays the same run exactly.
pub struct TelemetryGenerator {
    config: GeneratorConfig,
    scenario: String,
    tunnel: TunnelGeometry,
    rng: StdRng,
}

/// One tick's worth of sensor jitter.
struct Noise {
    drag: f64,
    lift: f64,
    reynolds: f64,
    velocity: f64,
    pressure: f64,
    temperature: f64,
}

impl TelemetryGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config: config.sanitized(),
            scenario: "standard".to_string(),
            tunnel: TunnelGeometry::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Labels the config snapshot stamped into every measurement.
    pub fn set_scenario(&mut self, scenario: &str, tunnel: TunnelGeometry) {
        self.scenario = scenario.to_string();
        self.tunnel = tunnel;
    }

    /// Replaces the active configuration; the next tick sees all new values.
    #[allow(dead_code)]
    pub fn configure(&mut self, config: GeneratorConfig) {
        self.config = config.sanitized();
    }

    /// Merges a partial update over the active configuration.
    pub fn apply_update(&mut self, update: &ConfigUpdate) {
        self.config = update.apply(&self.config).sanitized();
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Produces the measurement for the given point in elapsed run time.
    pub fn tick(&mut self, elapsed_secs: f64, timestamp: DateTime<Utc>) -> Measurement {
        let cfg = self.config.clone();
        let noise = self.draw_noise();

        let coefficients = aero::coefficients(cfg.model_type, cfg.angle_of_attack, elapsed_secs);
        let drag_force = aero::force_from_coefficient(coefficients.drag, cfg.wind_speed);
        let lift_force = aero::force_from_coefficient(coefficients.lift, cfg.wind_speed);

        let temperature_variation = (elapsed_secs * 0.1).sin() * 0.5;
        let pressure_variation = (elapsed_secs * 0.05).cos() * 0.2;

        // Each strain gauge carries a quarter of the drag load plus its own jitter.
        let mut gauges = [0.0f64; 4];
        for gauge in gauges.iter_mut() {
            *gauge = drag_force * 0.25 + self.noise_sample(0.02) * 0.1;
        }

        Measurement {
            timestamp,
            wind_speed: cfg.wind_speed + noise.velocity * 2.0,
            temperature: cfg.temperature + temperature_variation + noise.temperature,
            humidity: cfg.humidity,
            pressure: cfg.pressure + pressure_variation + noise.pressure,
            drag_force: drag_force + noise.drag * cfg.turbulence,
            lift_force: lift_force + noise.lift * cfg.turbulence,
            reynolds_number: aero::reynolds_number(cfg.wind_speed) + noise.reynolds * 10_000.0,
            mach_number: aero::mach_number(cfg.wind_speed),
            angle_of_attack: cfg.angle_of_attack,
            model_position: Vec3::default(),
            model_rotation: Vec3::default(),
            sensor_readings: SensorReadings {
                strain_gauge_1: gauges[0],
                strain_gauge_2: gauges[1],
                strain_gauge_3: gauges[2],
                strain_gauge_4: gauges[3],
                pressure_sensor_1: cfg.pressure + pressure_variation * 0.5,
                pressure_sensor_2: cfg.pressure + pressure_variation * 0.3,
                pressure_sensor_3: cfg.pressure + pressure_variation * 0.7,
                pressure_sensor_4: cfg.pressure + pressure_variation * 0.4,
            },
            environmental_factors: EnvironmentalFactors::default(),
            simulation_config: ConfigSnapshot {
                scenario: self.scenario.clone(),
                model_type: cfg.model_type,
                wind_tunnel_length: self.tunnel.length,
                wind_tunnel_width: self.tunnel.width,
                wind_tunnel_height: self.tunnel.height,
            },
        }
    }

    /// Uniform jitter centered on zero with the given peak-to-peak amplitude.
    fn noise_sample(&mut self, amplitude: f64) -> f64 {
        (self.rng.gen::<f64>() - 0.5) * amplitude
    }

    fn draw_noise(&mut self) -> Noise {
        Noise {
            drag: self.noise_sample(0.02),
            lift: self.noise_sample(0.01),
            reynolds: self.noise_sample(0.1),
            velocity: self.noise_sample(0.5),
            pressure: self.noise_sample(0.1),
            temperature: self.noise_sample(0.2),
        }
    }
}
