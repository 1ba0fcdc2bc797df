//! # JSON-RPC Peer Prelude
//!
//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use turul_json_rpc_peer::prelude::*;
//! ```

pub use crate::config::EngineConfig;
pub use crate::connection::{Connection, ConnectionOwner, OutputSink, PendingResponse};
pub use crate::diagnostics::Diagnostic;
pub use crate::dispatch::{CallContext, Responder};
pub use crate::engine::Engine;
pub use crate::error::{HandlerError, JsonRpcErrorObject, PeerError, ToJsonRpcError};
pub use crate::pending::CallResult;
pub use crate::registry::{Handler, MethodOptions};
pub use crate::request::Params;
pub use crate::types::RequestId;

// Error codes
pub use crate::error_codes::*;
