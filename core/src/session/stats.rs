use serde::Serialize;
use uuid::Uuid;

/// Min/max/average aggregate over one measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ChannelStats {
    /// Aggregates the values; `None` when the slice is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in values {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        Some(Self {
            min,
            max,
            avg: sum / values.len() as f64,
        })
    }
}

/// Aggregate summary for one recorded session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: Uuid,
    pub session_name: String,
    pub data_points: usize,
    pub duration_secs: f64,
    pub drag_force: ChannelStats,
    pub lift_force: ChannelStats,
    pub wind_speed: ChannelStats,
    pub pressure: ChannelStats,
}
