use crate::aero;
use crate::measurement::config::ModelType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 3-axis vector carrying model position or rotation hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Named sub-sensor channels sampled alongside every measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub strain_gauge_1: f64,
    pub strain_gauge_2: f64,
    pub strain_gauge_3: f64,
    pub strain_gauge_4: f64,
    pub pressure_sensor_1: f64,
    pub pressure_sensor_2: f64,
    pub pressure_sensor_3: f64,
    pub pressure_sensor_4: f64,
}

/// Ambient flow constants, effectively static per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalFactors {
    pub air_density: f64,
    pub dynamic_viscosity: f64,
    pub speed_of_sound: f64,
}

impl Default for EnvironmentalFactors {
    fn default() -> Self {
        Self {
            air_density: aero::AIR_DENSITY,
            dynamic_viscosity: aero::DYNAMIC_VISCOSITY,
            speed_of_sound: aero::SPEED_OF_SOUND,
        }
    }
}

/// Generator settings captured when the record was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub scenario: String,
    pub model_type: ModelType,
    pub wind_tunnel_length: f64,
    pub wind_tunnel_width: f64,
    pub wind_tunnel_height: f64,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            scenario: "standard".to_string(),
            model_type: ModelType::Car,
            wind_tunnel_length: 10.0,
            wind_tunnel_width: 2.0,
            wind_tunnel_height: 2.0,
        }
    }
}

/// One synthesized aerodynamic sample at a point in time.
///
/// Measurements are self-contained value records: none holds a reference to
/// another, and history ordering is purely by capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub wind_speed: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub drag_force: f64,
    pub lift_force: f64,
    pub reynolds_number: f64,
    pub mach_number: f64,
    pub angle_of_attack: f64,
    pub model_position: Vec3,
    pub model_rotation: Vec3,
    pub sensor_readings: SensorReadings,
    pub environmental_factors: EnvironmentalFactors,
    pub simulation_config: ConfigSnapshot,
}

#[cfg(test)]
pub(crate) fn sample_measurement() -> Measurement {
    use chrono::TimeZone;

    // Consistent with a 20 m/s free stream over a car model (q = 245 Pa).
    Measurement {
        timestamp: Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap(),
        wind_speed: 20.0,
        temperature: 22.5,
        humidity: 50.0,
        pressure: 101.3,
        drag_force: 73.5,
        lift_force: 24.5,
        reynolds_number: 1_333_333.0,
        mach_number: 0.0583,
        angle_of_attack: 0.0,
        model_position: Vec3::default(),
        model_rotation: Vec3::default(),
        sensor_readings: SensorReadings {
            strain_gauge_1: 18.375,
            strain_gauge_2: 18.375,
            strain_gauge_3: 18.375,
            strain_gauge_4: 18.375,
            pressure_sensor_1: 101.4,
            pressure_sensor_2: 101.36,
            pressure_sensor_3: 101.44,
            pressure_sensor_4: 101.38,
        },
        environmental_factors: EnvironmentalFactors::default(),
        simulation_config: ConfigSnapshot::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(sample_measurement()).unwrap();
        assert_eq!(value["windSpeed"], 20.0);
        assert_eq!(value["dragForce"], 73.5);
        assert_eq!(value["sensorReadings"]["strainGauge1"], 18.375);
        assert_eq!(value["environmentalFactors"]["airDensity"], 1.225);
        assert_eq!(value["simulationConfig"]["modelType"], "car");
        let stamp = value["timestamp"].as_str().unwrap();
        assert!(stamp.starts_with("2024-05-14T12:00:00"));
    }

    #[test]
    fn measurement_round_trips_through_json() {
        let original = sample_measurement();
        let text = serde_json::to_string(&original).unwrap();
        let back: Measurement = serde_json::from_str(&text).unwrap();
        assert_eq!(back, original);
    }
}
