//! Locally-observable events that are never sent to the peer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::JsonRpcErrorObject;
use crate::types::RequestId;

#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// The peer sent something malformed; it was answered with "invalid request"
    ProtocolViolation {
        id: Option<RequestId>,
        reason: String,
    },
    /// A response arrived for an id that is not pending
    UnknownCall { id: RequestId },
    /// The peer sent an error response with no usable id
    PeerReportedError { error: Value },
    /// A notification could not be dispatched or its handler failed
    NotificationFailed {
        method: String,
        error: JsonRpcErrorObject,
    },
    /// A deferred responder was dropped without responding
    ResponderDropped { method: String, id: RequestId },
}

pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Logs every diagnostic and forwards it to the optional hook
#[derive(Clone, Default)]
pub(crate) struct Diagnostics {
    hook: Option<DiagnosticHook>,
}

impl Diagnostics {
    pub(crate) fn new(hook: Option<DiagnosticHook>) -> Self {
        Self { hook }
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ProtocolViolation { id, reason } => {
                warn!(?id, %reason, "Protocol violation from peer");
            }
            Diagnostic::UnknownCall { id } => {
                warn!(%id, "Received response for unknown call");
            }
            Diagnostic::PeerReportedError { error } => {
                warn!(%error, "Peer reported an uncorrelated error");
            }
            Diagnostic::NotificationFailed { method, error } => {
                debug!(%method, code = error.code, message = %error.message, "Notification failed");
            }
            Diagnostic::ResponderDropped { method, id } => {
                debug!(%method, %id, "Responder dropped without a response");
            }
        }

        if let Some(hook) = &self.hook {
            hook(&diagnostic);
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
