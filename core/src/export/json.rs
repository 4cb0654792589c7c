use crate::measurement::Measurement;
use crate::prelude::{TunnelError, TunnelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format marker embedded in every structured export.
pub const EXPORT_FORMAT_MARKER: &str = "wind-tunnel-data";

/// Header block of a structured export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    pub data_points: usize,
    pub format: String,
}

/// Structured export document: metadata plus the full measurement array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredExport {
    pub metadata: ExportMetadata,
    pub data: Vec<Measurement>,
}

/// Renders measurements as a pretty-printed structured document.
pub fn encode_structured(
    measurements: &[Measurement],
    exported_at: DateTime<Utc>,
) -> TunnelResult<String> {
    let document = StructuredExport {
        metadata: ExportMetadata {
            export_date: exported_at,
            data_points: measurements.len(),
            format: EXPORT_FORMAT_MARKER.to_string(),
        },
        data: measurements.to_vec(),
    };
    serde_json::to_string_pretty(&document).map_err(|e| TunnelError::Encode(e.to_string()))
}

/// Parses a document produced by [`encode_structured`].
pub fn decode_structured(text: &str) -> TunnelResult<StructuredExport> {
    serde_json::from_str(text).map_err(|e| TunnelError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::record::sample_measurement;
    use chrono::TimeZone;

    fn export_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 8, 30, 0).unwrap()
    }

    #[test]
    fn structured_export_round_trips() {
        let measurements = vec![sample_measurement(), sample_measurement()];
        let first = encode_structured(&measurements, export_instant()).unwrap();

        let decoded = decode_structured(&first).unwrap();
        assert_eq!(decoded.data, measurements);

        let second = encode_structured(&decoded.data, export_instant()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn metadata_describes_the_payload() {
        let text = encode_structured(&[sample_measurement()], export_instant()).unwrap();
        let decoded = decode_structured(&text).unwrap();
        assert_eq!(decoded.metadata.data_points, 1);
        assert_eq!(decoded.metadata.format, EXPORT_FORMAT_MARKER);
        assert_eq!(decoded.metadata.export_date, export_instant());
    }

    #[test]
    fn malformed_document_is_a_decode_failure() {
        let err = decode_structured("{not json").unwrap_err();
        assert!(matches!(err, TunnelError::Decode(_)));
    }
}
