//! Closed-form aerodynamic relations shared by the generator and exporters.

use crate::measurement::ModelType;

pub const AIR_DENSITY: f64 = 1.225; // kg/m^3 at sea level
pub const DYNAMIC_VISCOSITY: f64 = 1.81e-5; // Pa*s for air at 20 C
pub const SPEED_OF_SOUND: f64 = 343.2; // m/s at 20 C
pub const KINEMATIC_VISCOSITY: f64 = 1.5e-5; // m^2/s for air at 20 C
pub const CHARACTERISTIC_LENGTH: f64 = 1.0; // m, typical tunnel model scale

/// Drag/lift coefficient pair for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub drag: f64,
    pub lift: f64,
}

/// Model-specific coefficient curves with a slow sinusoidal drift term.
pub fn coefficients(model: ModelType, angle_of_attack: f64, elapsed_secs: f64) -> Coefficients {
    let angle_rad = angle_of_attack.to_radians();
    let time_variation = (elapsed_secs * 0.5).sin() * 0.1;

    match model {
        ModelType::Car => Coefficients {
            drag: 0.3 + (elapsed_secs * 0.2).sin() * 0.05 + time_variation,
            lift: 0.1 + (elapsed_secs * 0.3).cos() * 0.02,
        },
        ModelType::Aerofoil => Coefficients {
            drag: 0.02 + angle_of_attack.powi(2) * 0.001 + time_variation,
            lift: 0.1 * angle_of_attack + angle_rad.sin() * 0.2 + time_variation,
        },
        ModelType::Building => Coefficients {
            drag: 1.2 + (elapsed_secs * 0.1).sin() * 0.1 + time_variation,
            lift: (elapsed_secs * 0.4).cos() * 0.01,
        },
        ModelType::Custom => Coefficients {
            drag: 0.5 + (elapsed_secs * 0.3).sin() * 0.08 + time_variation,
            lift: 0.2 + (elapsed_secs * 0.2).cos() * 0.05 + time_variation,
        },
    }
}

pub fn dynamic_pressure(wind_speed: f64) -> f64 {
    0.5 * AIR_DENSITY * wind_speed * wind_speed
}

pub fn force_from_coefficient(coefficient: f64, wind_speed: f64) -> f64 {
    coefficient * dynamic_pressure(wind_speed)
}

/// Inverse of [`force_from_coefficient`]; zero when the free stream is still.
pub fn coefficient_from_force(force: f64, wind_speed: f64) -> f64 {
    let q = dynamic_pressure(wind_speed);
    if q <= f64::EPSILON {
        0.0
    } else {
        force / q
    }
}

pub fn reynolds_number(wind_speed: f64) -> f64 {
    wind_speed * CHARACTERISTIC_LENGTH / KINEMATIC_VISCOSITY
}

pub fn mach_number(wind_speed: f64) -> f64 {
    wind_speed / SPEED_OF_SOUND
}
