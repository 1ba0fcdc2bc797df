use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HandlerError, PeerError};
use crate::types::{JsonRpcVersion, RequestId};

/// Parameters of a request or notification
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Params {
    /// Positional parameters as an array
    Positional(Vec<Value>),
    /// Named parameters as an object
    ByName(Map<String, Value>),
}

impl Params {
    /// Empty parameters of the given convention
    pub fn empty(by_name: bool) -> Self {
        if by_name {
            Params::ByName(Map::new())
        } else {
            Params::Positional(Vec::new())
        }
    }

    pub fn is_by_name(&self) -> bool {
        matches!(self, Params::ByName(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Params::ByName(_) => "object",
            Params::Positional(_) => "array",
        }
    }

    /// Get a parameter by name (object params only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Params::ByName(map) => map.get(key),
            Params::Positional(_) => None,
        }
    }

    /// Get a parameter by index (array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Params::Positional(vec) => vec.get(index),
            Params::ByName(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::ByName(map) => map.is_empty(),
            Params::Positional(vec) => vec.is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Params::ByName(map) => Value::Object(map.clone()),
            Params::Positional(vec) => Value::Array(vec.clone()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Params::ByName(map) => Value::Object(map),
            Params::Positional(vec) => Value::Array(vec),
        }
    }

    /// Deserialize the parameters into a typed value.
    /// Failures map to an "invalid params" error for the peer.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(self.into_value())?)
    }
}

impl TryFrom<Value> for Params {
    type Error = PeerError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Params::ByName(map)),
            Value::Array(vec) => Ok(Params::Positional(vec)),
            Value::Null => Err(PeerError::InvalidArguments("null")),
            Value::Bool(_) => Err(PeerError::InvalidArguments("boolean")),
            Value::Number(_) => Err(PeerError::InvalidArguments("number")),
            Value::String(_) => Err(PeerError::InvalidArguments("string")),
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::ByName(map)
    }
}

impl From<Vec<Value>> for Params {
    fn from(vec: Vec<Value>) -> Self {
        Params::Positional(vec)
    }
}

/// A JSON-RPC request expecting a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    pub params: Params,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Params) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id,
        }
    }
}
