//! # Bidirectional JSON-RPC 2.0 Engine
//!
//! A transport-agnostic JSON-RPC 2.0 peer. Both ends of a connection may issue
//! calls and notifications and serve the other side's calls at the same time.
//! This crate provides call correlation, message validation and policy-driven
//! method dispatch; bytes in and out are the embedding application's business.
//!
//! ## Features
//! - Outbound calls with one-shot callbacks or awaitable [`PendingResponse`]s
//! - Method registry shared across connections, with per-method policy:
//!   named/positional params, deferred completion, notification-only,
//!   connection-state gating
//! - Protocol violations answered with JSON-RPC error responses, never fatal
//! - Pluggable [`Codec`] (defaults to `serde_json`)

pub mod codec;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod message;
pub mod notification;
pub mod pending;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use codec::{Codec, CodecError, JsonCodec};
pub use config::EngineConfig;
pub use connection::{
    Connection, ConnectionBuilder, ConnectionOwner, OutputSink, PendingResponse, WeakConnection,
};
pub use diagnostics::Diagnostic;
pub use dispatch::{CallContext, Responder};
pub use engine::{Engine, EngineBuilder};
pub use error::{
    HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, PeerError, ToJsonRpcError,
};
pub use notification::JsonRpcNotification;
pub use pending::{CallResult, ResponseCallback};
pub use registry::{
    DeferredMethodHandler, Handler, MethodEntry, MethodHandler, MethodOptions, MethodRegistry,
};
pub use request::{JsonRpcRequest, Params};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Error codes sent to the peer
pub mod error_codes {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    /// A handler reported a failure
    pub const HANDLER_FAILED: i64 = -32000;
    /// A state-gated method was called in the wrong connection state
    pub const INVALID_STATE: i64 = -32001;
}
