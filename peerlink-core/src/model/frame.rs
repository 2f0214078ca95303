use crate::model::signaling::SignalingMessage;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("frame is an empty array")]
    Empty,

    #[error("unrecognised signaling payload: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Decode one inbound text frame into a typed message.
///
/// Relays wrap event arguments inconsistently: a payload may arrive as a bare
/// object, as an array whose first element is the object, or as a JSON string
/// holding either of those. All of them end up as the same typed message.
pub fn decode_frame(text: &str) -> Result<SignalingMessage, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(FrameError::Json)?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<SignalingMessage, FrameError> {
    match value {
        Value::Array(items) => {
            let first = items.into_iter().next().ok_or(FrameError::Empty)?;
            decode_value(first)
        }
        Value::String(inner) => decode_frame(&inner),
        other => serde_json::from_value(other).map_err(FrameError::Payload),
    }
}
