use serde::{Deserialize, Serialize};

/// Test-article geometry mounted in the working section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Car,
    Aerofoil,
    Building,
    Custom,
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Car
    }
}

/// Tunable inputs read by the generator as one snapshot per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    /// Free-stream target in m/s.
    pub wind_speed: f64,
    pub model_type: ModelType,
    /// Degrees; only the aerofoil curves react to it.
    pub angle_of_attack: f64,
    /// Ambient temperature in degrees C.
    pub temperature: f64,
    /// Ambient pressure in kPa.
    pub pressure: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Jitter intensity, 0 to 1.
    pub turbulence: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            wind_speed: 25.0,
            model_type: ModelType::Car,
            angle_of_attack: 0.0,
            temperature: 22.5,
            pressure: 101.3,
            humidity: 50.0,
            turbulence: 0.1,
        }
    }
}

impl GeneratorConfig {
    /// Clamps every field into its physically meaningful range.
    pub fn sanitized(&self) -> Self {
        Self {
            wind_speed: self.wind_speed.max(0.0),
            turbulence: self.turbulence.clamp(0.0, 1.0),
            humidity: self.humidity.clamp(0.0, 100.0),
            ..self.clone()
        }
    }
}

/// Partial configuration patch; unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_of_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbulence: Option<f64>,
}

impl ConfigUpdate {
    /// Overlays the set fields on `base` and returns the merged config.
    pub fn apply(&self, base: &GeneratorConfig) -> GeneratorConfig {
        GeneratorConfig {
            wind_speed: self.wind_speed.unwrap_or(base.wind_speed),
            model_type: self.model_type.unwrap_or(base.model_type),
            angle_of_attack: self.angle_of_attack.unwrap_or(base.angle_of_attack),
            temperature: self.temperature.unwrap_or(base.temperature),
            pressure: self.pressure.unwrap_or(base.pressure),
            humidity: self.humidity.unwrap_or(base.humidity),
            turbulence: self.turbulence.unwrap_or(base.turbulence),
        }
    }
}

/// Working-section dimensions stamped into each measurement snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TunnelGeometry {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for TunnelGeometry {
    fn default() -> Self {
        Self {
            length: 10.0,
            width: 2.0,
            height: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_out_of_range_fields() {
        let cfg = GeneratorConfig {
            wind_speed: -5.0,
            turbulence: 1.8,
            humidity: 130.0,
            ..Default::default()
        };
        let clean = cfg.sanitized();
        assert_eq!(clean.wind_speed, 0.0);
        assert_eq!(clean.turbulence, 1.0);
        assert_eq!(clean.humidity, 100.0);
        assert_eq!(clean.temperature, cfg.temperature);
    }

    #[test]
    fn update_overlays_only_set_fields() {
        let base = GeneratorConfig::default();
        let patch = ConfigUpdate {
            wind_speed: Some(40.0),
            model_type: Some(ModelType::Aerofoil),
            ..Default::default()
        };
        let merged = patch.apply(&base);
        assert_eq!(merged.wind_speed, 40.0);
        assert_eq!(merged.model_type, ModelType::Aerofoil);
        assert_eq!(merged.pressure, base.pressure);
        assert_eq!(merged.turbulence, base.turbulence);
    }

    #[test]
    fn model_type_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&ModelType::Aerofoil).unwrap(),
            "\"aerofoil\""
        );
        let parsed: ModelType = serde_json::from_str("\"building\"").unwrap();
        assert_eq!(parsed, ModelType::Building);
    }

    #[test]
    fn partial_update_parses_from_sparse_json() {
        let patch: ConfigUpdate = serde_json::from_str(r#"{"windSpeed": 12.5}"#).unwrap();
        assert_eq!(patch.wind_speed, Some(12.5));
        assert!(patch.model_type.is_none());
    }
}
