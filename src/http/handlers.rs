use super::listener::HeartRateEvent;
use super::state::ListenerState;
use crate::error::{CollectorError, Result};
use axum::{body::Bytes, extract::rejection::BytesRejection, extract::State};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Body returned when a request was accepted (or ignored)
pub const ACK_GOOD: &str = "good";

/// Body returned when a heart rate payload was rejected
pub const ACK_BAD: &str = "bad";

/// JSON field carrying the reading
pub const HEART_RATE_FIELD: &str = "heartrate";

/// Decode `{"heartrate": <number>}` from a request body.
///
/// The reading may also be sent as a numeric string.
pub fn decode_heart_rate(body: &[u8]) -> Result<f64> {
    let malformed = |reason: String| CollectorError::MalformedPayload { reason };

    let json: Value =
        serde_json::from_slice(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let object = json
        .as_object()
        .ok_or_else(|| malformed("body is not a JSON object".to_string()))?;

    let value = object
        .get(HEART_RATE_FIELD)
        .ok_or_else(|| malformed(format!("missing `{}` field", HEART_RATE_FIELD)))?;

    let reading = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    reading
        .filter(|hr| hr.is_finite())
        .ok_or_else(|| malformed(format!("`{}` is not a number: {}", HEART_RATE_FIELD, value)))
}

// ============================================================================
// Handlers
// ============================================================================

/// ANY /heartrate
/// Decode a reading and forward it to the registered listener
pub async fn heart_rate(
    State(state): State<ListenerState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> &'static str {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read heart rate request body: {}", e);
            return ACK_BAD;
        }
    };

    match decode_heart_rate(&body) {
        Ok(heart_rate) => {
            info!("Got heart rate: {}", heart_rate);
            state.registry.dispatch(HeartRateEvent::new(heart_rate));
            ACK_GOOD
        }
        Err(e) => {
            info!("Caught request with no heart rate: {}", e);
            ACK_BAD
        }
    }
}

/// Every other path: acknowledge without side effects
pub async fn acknowledge(uri: axum::http::Uri) -> &'static str {
    debug!("Acknowledging request to {}", uri.path());
    ACK_GOOD
}
