use thiserror::Error;

/// Top-level error type for the `greennet-api` crate.
///
/// Covers the transport boundary: topic and payload decoding, and the
/// MQTT client. `greennet-core` maps these into domain errors; decode
/// failures never cross a message boundary there.
#[derive(Debug, Error)]
pub enum Error {
    // ── Decoding ────────────────────────────────────────────────────
    /// Topic path does not follow `<base>/<gateway>/<category>/...`.
    #[error("Malformed topic '{topic}': {reason}")]
    MalformedTopic { topic: String, reason: String },

    /// Payload is not valid JSON or lacks a required structure.
    #[error("Malformed payload on '{topic}': {reason}")]
    MalformedPayload { topic: String, reason: String },

    /// Raw JSON failure outside a topic context (encoding side).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Transport ───────────────────────────────────────────────────
    /// The MQTT client rejected a request (queue full or event loop gone).
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Broker connection failed or dropped.
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// Broker URL could not be parsed.
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn malformed_topic(topic: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTopic {
            topic: topic.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_payload(topic: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            topic: topic.to_owned(),
            reason: reason.into(),
        }
    }
}
