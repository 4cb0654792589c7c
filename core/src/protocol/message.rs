use crate::measurement::{ConfigUpdate, Measurement};
use crate::prelude::{TunnelError, TunnelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commands a viewer can issue to the dashboard host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandPayload {
    StartSimulation,
    StopSimulation,
    ClearHistory,
}

/// Status payloads sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusPayload {
    /// Greeting pushed right after a connection opens.
    #[serde(rename_all = "camelCase")]
    Connected {
        connected: bool,
        timestamp: DateTime<Utc>,
    },
    /// Acknowledgement echoed for an inbound command.
    #[serde(rename_all = "camelCase")]
    CommandAck {
        command_received: bool,
        command: CommandPayload,
    },
}

/// Config payloads: an inbound partial update or the relay's echo of one.
///
/// `Ack` must stay first: a partial update tolerates unknown fields, so it
/// would also match acknowledgement objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigPayload {
    #[serde(rename_all = "camelCase")]
    Ack {
        config_received: bool,
        config: ConfigUpdate,
    },
    Update(ConfigUpdate),
}

/// Error payload answered to an offending connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Typed relay traffic, discriminated by the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum RelayMessage {
    Data(Measurement),
    Status(StatusPayload),
    Config(ConfigPayload),
    Command(CommandPayload),
    Error(ErrorPayload),
}

impl RelayMessage {
    /// Wire name of the message's `type` discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Data(_) => "data",
            RelayMessage::Status(_) => "status",
            RelayMessage::Config(_) => "config",
            RelayMessage::Command(_) => "command",
            RelayMessage::Error(_) => "error",
        }
    }
}

/// Wire envelope carrying one message and its send instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: RelayMessage,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(message: RelayMessage, timestamp: DateTime<Utc>) -> Self {
        Self { message, timestamp }
    }

    /// Greeting sent when a connection opens.
    pub fn connected(now: DateTime<Utc>) -> Self {
        Self::new(
            RelayMessage::Status(StatusPayload::Connected {
                connected: true,
                timestamp: now,
            }),
            now,
        )
    }

    pub fn data(measurement: Measurement, now: DateTime<Utc>) -> Self {
        Self::new(RelayMessage::Data(measurement), now)
    }

    /// Command frame as a viewer sends it.
    pub fn command(command: CommandPayload, now: DateTime<Utc>) -> Self {
        Self::new(RelayMessage::Command(command), now)
    }

    /// Partial config update as a viewer sends it.
    pub fn config_update(update: ConfigUpdate, now: DateTime<Utc>) -> Self {
        Self::new(RelayMessage::Config(ConfigPayload::Update(update)), now)
    }

    pub fn command_ack(command: CommandPayload, now: DateTime<Utc>) -> Self {
        Self::new(
            RelayMessage::Status(StatusPayload::CommandAck {
                command_received: true,
                command,
            }),
            now,
        )
    }

    pub fn config_ack(config: ConfigUpdate, now: DateTime<Utc>) -> Self {
        Self::new(
            RelayMessage::Config(ConfigPayload::Ack {
                config_received: true,
                config,
            }),
            now,
        )
    }

    pub fn error(message: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            RelayMessage::Error(ErrorPayload {
                message: message.to_string(),
            }),
            now,
        )
    }

    /// Serializes one frame for the wire.
    pub fn to_json(&self) -> TunnelResult<String> {
        serde_json::to_string(self).map_err(|e| TunnelError::Encode(e.to_string()))
    }

    /// Parses one inbound frame; unknown types or commands fail decoding.
    pub fn from_json(text: &str) -> TunnelResult<Envelope> {
        serde_json::from_str(text).map_err(|e| TunnelError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::record::sample_measurement;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn data_envelope_has_tagged_wire_shape() {
        let text = Envelope::data(sample_measurement(), now()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "data");
        assert_eq!(value["payload"]["windSpeed"], 20.0);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn inbound_command_parses_from_raw_text() {
        let text = r#"{"type":"command","payload":"start-simulation","timestamp":"2024-05-14T12:00:00Z"}"#;
        let envelope = Envelope::from_json(text).unwrap();
        assert_eq!(
            envelope.message,
            RelayMessage::Command(CommandPayload::StartSimulation)
        );
    }

    #[test]
    fn unknown_command_fails_decoding() {
        let text = r#"{"type":"command","payload":"self-destruct","timestamp":"2024-05-14T12:00:00Z"}"#;
        let err = Envelope::from_json(text).unwrap_err();
        assert!(matches!(err, TunnelError::Decode(_)));
    }

    #[test]
    fn config_update_and_ack_are_distinguished() {
        let update_text =
            r#"{"type":"config","payload":{"windSpeed":30.0},"timestamp":"2024-05-14T12:00:00Z"}"#;
        let envelope = Envelope::from_json(update_text).unwrap();
        match envelope.message {
            RelayMessage::Config(ConfigPayload::Update(update)) => {
                assert_eq!(update.wind_speed, Some(30.0));
            }
            other => panic!("expected config update, got {:?}", other),
        }

        let ack = Envelope::config_ack(ConfigUpdate::default(), now());
        let round_trip = Envelope::from_json(&ack.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, ack);
    }

    #[test]
    fn greeting_reports_connected() {
        let text = Envelope::connected(now()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["payload"]["connected"], true);
    }

    #[test]
    fn command_ack_round_trips() {
        let ack = Envelope::command_ack(CommandPayload::ClearHistory, now());
        let back = Envelope::from_json(&ack.to_json().unwrap()).unwrap();
        assert_eq!(back, ack);
    }

    #[test]
    fn malformed_text_fails_decoding() {
        assert!(matches!(
            Envelope::from_json("not json at all"),
            Err(TunnelError::Decode(_))
        ));
    }
}
