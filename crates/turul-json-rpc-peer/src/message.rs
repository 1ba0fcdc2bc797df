use serde_json::{Map, Value};

use crate::error::{JsonRpcErrorObject, PeerError};
use crate::request::Params;
use crate::types::RequestId;

/// An inbound message that passed envelope validation
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Request (with id) or notification (without)
    Request(InboundRequest),
    /// Response to one of our calls
    Response(InboundResponse),
    /// Error response carrying no usable id: the peer reporting a
    /// violation it could not attribute.
    ///
    /// Unlike other malformed input it gets no null-id `-32600` reply, since two
    /// engines would otherwise answer each other's errors indefinitely. It is
    /// only reported locally as
    /// [`Diagnostic::PeerReportedError`](crate::Diagnostic::PeerReportedError).
    UncorrelatedError(Value),
}

#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub id: Option<RequestId>,
    pub method: String,
    /// `None` when the peer omitted `params`
    pub params: Option<Params>,
}

impl InboundRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub id: RequestId,
    pub outcome: Result<Value, JsonRpcErrorObject>,
}

/// A validation failure, with the offending message's id when it could be recovered
#[derive(Debug)]
pub struct InvalidMessage {
    pub id: Option<RequestId>,
    pub error: PeerError,
}

impl InvalidMessage {
    fn new(id: Option<RequestId>, error: PeerError) -> Self {
        Self { id, error }
    }
}

/// Validate a decoded value and classify it
pub fn parse_message(value: Value) -> Result<IncomingMessage, InvalidMessage> {
    let Value::Object(mut obj) = value else {
        return Err(InvalidMessage::new(
            None,
            PeerError::InvalidObject("expected a JSON object".to_string()),
        ));
    };

    let recoverable_id = obj.get("id").and_then(RequestId::from_value);

    match obj.get("jsonrpc") {
        Some(Value::String(version)) if version == crate::JSONRPC_VERSION => {}
        _ => return Err(InvalidMessage::new(recoverable_id, PeerError::InvalidVersion)),
    }

    let has_method = obj.contains_key("method");
    let id_is_null_or_absent = matches!(obj.get("id"), None | Some(Value::Null));
    if !has_method && id_is_null_or_absent && obj.contains_key("error") {
        let error = obj.remove("error").unwrap_or(Value::Null);
        return Ok(IncomingMessage::UncorrelatedError(error));
    }

    let id = match obj.get("id") {
        None => None,
        Some(raw) => match RequestId::from_value(raw) {
            Some(id) => Some(id),
            None => return Err(InvalidMessage::new(None, PeerError::InvalidId)),
        },
    };

    if has_method {
        return parse_request(obj, id).map(IncomingMessage::Request);
    }

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");
    match (id, has_result, has_error) {
        (Some(id), true, true) => Err(InvalidMessage::new(
            Some(id),
            PeerError::InvalidObject("response carries both result and error".to_string()),
        )),
        (Some(id), true, false) => {
            let result = obj.remove("result").unwrap_or(Value::Null);
            Ok(IncomingMessage::Response(InboundResponse {
                id,
                outcome: Ok(result),
            }))
        }
        (Some(id), false, true) => {
            let raw = obj.remove("error").unwrap_or(Value::Null);
            match validate_error_object(&raw) {
                Ok(error) => Ok(IncomingMessage::Response(InboundResponse {
                    id,
                    outcome: Err(error),
                })),
                Err(error) => Err(InvalidMessage::new(Some(id), error)),
            }
        }
        (id, _, _) => Err(InvalidMessage::new(
            id,
            PeerError::InvalidObject("invalid object".to_string()),
        )),
    }
}

fn parse_request(
    mut obj: Map<String, Value>,
    id: Option<RequestId>,
) -> Result<InboundRequest, InvalidMessage> {
    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => {
            return Err(InvalidMessage::new(
                id,
                PeerError::InvalidObject("method must be a string".to_string()),
            ));
        }
    };

    let params = match obj.remove("params") {
        None => None,
        Some(raw) => match Params::try_from(raw) {
            Ok(params) => Some(params),
            Err(_) => {
                return Err(InvalidMessage::new(
                    id,
                    PeerError::InvalidObject("params must be an array or an object".to_string()),
                ));
            }
        },
    };

    Ok(InboundRequest { id, method, params })
}

/// Check an inbound error object: integer code, scalar message, and no
/// members beyond `code`, `message` and `data`.
pub fn validate_error_object(raw: &Value) -> Result<JsonRpcErrorObject, PeerError> {
    let Value::Object(obj) = raw else {
        return Err(PeerError::InvalidErrorObject("expected an object".to_string()));
    };

    if let Some(extra) = obj
        .keys()
        .find(|key| !matches!(key.as_str(), "code" | "message" | "data"))
    {
        return Err(PeerError::InvalidErrorObject(format!(
            "unexpected member '{}'",
            extra
        )));
    }

    let code = obj
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| PeerError::InvalidErrorObject("code must be an integer".to_string()))?;

    let message = match obj.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar.to_string(),
        _ => {
            return Err(PeerError::InvalidErrorObject(
                "message must be a scalar".to_string(),
            ));
        }
    };

    Ok(JsonRpcErrorObject {
        code,
        message,
        data: obj.get("data").cloned(),
    })
}
