pub mod csv;
pub mod json;

pub use csv::{encode_csv, CSV_HEADERS};
pub use json::{decode_structured, encode_structured, ExportMetadata, StructuredExport};

use crate::measurement::Measurement;
use crate::prelude::{TunnelError, TunnelResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Text formats supported by the export encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(TunnelError::Validation(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Encodes measurements in the requested format.
///
/// CSV output always carries the header row; `exported_at` only lands in
/// the structured metadata block.
pub fn encode(
    measurements: &[Measurement],
    format: ExportFormat,
    exported_at: DateTime<Utc>,
) -> TunnelResult<String> {
    match format {
        ExportFormat::Csv => Ok(csv::encode_csv(measurements, true)),
        ExportFormat::Json => json::encode_structured(measurements, exported_at),
    }
}

/// `{base}_{YYYY-MM-DD}.{ext}`, deterministic for a given day.
pub fn export_filename(base_name: &str, format: ExportFormat, day: NaiveDate) -> String {
    format!(
        "{}_{}.{}",
        base_name,
        day.format("%Y-%m-%d"),
        format.extension()
    )
}
