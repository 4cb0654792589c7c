use crate::aero;
use crate::measurement::Measurement;
use chrono::SecondsFormat;

/// Column set written by [`encode_csv`], in order.
pub const CSV_HEADERS: [&str; 9] = [
    "Timestamp",
    "Drag Coefficient",
    "Lift Coefficient",
    "Reynolds Number",
    "Velocity (m/s)",
    "Pressure (kPa)",
    "Temperature (°C)",
    "Drag Force (N)",
    "Lift Force (N)",
];

/// Renders measurements as comma-delimited rows.
///
/// Coefficients are derived back from the recorded forces, so the legacy
/// coefficient columns stay meaningful next to the force columns. All
/// fields are numeric or RFC 3339 timestamps; no quoting is required.
pub fn encode_csv(measurements: &[Measurement], include_headers: bool) -> String {
    let mut rows = Vec::with_capacity(measurements.len() + 1);
    if include_headers {
        rows.push(CSV_HEADERS.join(","));
    }

    for m in measurements {
        let drag_coeff = aero::coefficient_from_force(m.drag_force, m.wind_speed);
        let lift_coeff = aero::coefficient_from_force(m.lift_force, m.wind_speed);
        rows.push(format!(
            "{},{:.6},{:.6},{:.0},{:.2},{:.2},{:.2},{:.3},{:.3}",
            m.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            drag_coeff,
            lift_coeff,
            m.reynolds_number,
            m.wind_speed,
            m.pressure,
            m.temperature,
            m.drag_force,
            m.lift_force,
        ));
    }

    rows.join("\n")
}
