//! Codec adapter between message text and structured values.
//!
//! The engine never touches JSON text directly; everything goes through a
//! [`Codec`]. [`JsonCodec`] is the `serde_json` implementation used by default.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Text <-> structured value conversion
pub trait Codec: Send + Sync {
    /// Decode message text. Malformed text is an error, never a panic.
    fn decode(&self, text: &str) -> Result<Value, CodecError>;

    /// Encode a structured value. Assumed infallible for valid values.
    fn encode(&self, value: &Value) -> String;
}

/// `serde_json` codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError(e.to_string()))
    }

    fn encode(&self, value: &Value) -> String {
        value.to_string()
    }
}

/// Serialize a wire message and encode it with `codec`
pub(crate) fn encode_message<T: Serialize>(
    codec: &dyn Codec,
    message: &T,
) -> Result<String, CodecError> {
    let value = serde_json::to_value(message).map_err(|e| CodecError(e.to_string()))?;
    Ok(codec.encode(&value))
}
