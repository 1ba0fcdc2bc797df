use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// A registered handler reported a failure
    HandlerFailed,
    /// The method is gated on a connection state that does not hold
    InvalidState,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::InvalidRequest => crate::error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => crate::error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => crate::error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => crate::error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::HandlerFailed => crate::error_codes::HANDLER_FAILED,
            JsonRpcErrorCode::InvalidState => crate::error_codes::INVALID_STATE,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::HandlerFailed => "Server error",
            JsonRpcErrorCode::InvalidState => "Invalid state",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object: `{code, message, data?}` and nothing else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not found", method)),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams,
            Some(message.to_string()),
            None,
        )
    }

    pub fn invalid_state(method: &str, required: &str, actual: Option<&str>) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidState,
            Some(format!(
                "Method '{}' requires state '{}'",
                method, required
            )),
            Some(serde_json::json!({ "required": required, "actual": actual })),
        )
    }

    pub fn handler_failed(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::HandlerFailed,
            Some(message.to_string()),
            None,
        )
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message, None)
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        assert!(
            (crate::error_codes::SERVER_ERROR_START..=crate::error_codes::SERVER_ERROR_END)
                .contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorObject {}

/// JSON-RPC Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    /// Serialized as `null` when the origin could not be identified
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for JsonRpcError {}

/// Conversion of domain errors into wire error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Engine-level errors returned to the local caller
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("json decode failed: {0}")]
    Decode(String),

    #[error("json encode failed: {0}")]
    Encode(String),

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("invalid protocol version: expected \"2.0\"")]
    InvalidVersion,

    #[error("invalid id: must be a string or a number")]
    InvalidId,

    #[error("invalid error object: {0}")]
    InvalidErrorObject(String),

    #[error("invalid arguments: expected an array or an object, got {0}")]
    InvalidArguments(&'static str),

    #[error("duplicate call id '{0}'")]
    DuplicateCallId(RequestId),

    #[error("too many pending calls (limit {0})")]
    TooManyPendingCalls(usize),

    #[error("connection closed")]
    Closed,

    #[error("call abandoned before a response arrived")]
    Abandoned,

    #[error("remote error: {0}")]
    Remote(JsonRpcErrorObject),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PeerError {
    /// Whether this error is a protocol violation by the remote peer,
    /// answered with an "invalid request" error response.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            PeerError::Decode(_)
                | PeerError::InvalidObject(_)
                | PeerError::InvalidVersion
                | PeerError::InvalidId
                | PeerError::InvalidErrorObject(_)
        )
    }
}

impl ToJsonRpcError for PeerError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        if self.is_protocol_violation() {
            JsonRpcErrorObject::invalid_request(Some(Value::String(self.to_string())))
        } else {
            JsonRpcErrorObject::internal_error(Some(self.to_string()))
        }
    }
}

/// Failure reported by a registered method handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Generic failure, sent as a server error
    #[error("{0}")]
    Failed(String),

    /// The handler could not interpret its parameters
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Explicit error object, sent as-is
    #[error("{0}")]
    Rpc(JsonRpcErrorObject),
}

impl HandlerError {
    pub fn failed(message: impl fmt::Display) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

impl ToJsonRpcError for HandlerError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            HandlerError::Failed(message) => JsonRpcErrorObject::handler_failed(message),
            HandlerError::InvalidParams(message) => JsonRpcErrorObject::invalid_params(message),
            HandlerError::Rpc(object) => object.clone(),
        }
    }
}

impl From<JsonRpcErrorObject> for HandlerError {
    fn from(object: JsonRpcErrorObject) -> Self {
        HandlerError::Rpc(object)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        HandlerError::InvalidParams(error.to_string())
    }
}
