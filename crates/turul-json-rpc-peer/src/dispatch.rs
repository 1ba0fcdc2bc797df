use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::connection::{Connection, WeakConnection};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{HandlerError, JsonRpcErrorObject, ToJsonRpcError};
use crate::message::InboundRequest;
use crate::registry::{Handler, MethodRegistry};
use crate::request::Params;
use crate::types::RequestId;

/// What a handler knows about the call it is serving
#[derive(Debug, Clone)]
pub struct CallContext {
    connection: Connection,
    method: String,
    id: Option<RequestId>,
}

impl CallContext {
    /// The connection the call arrived on. Handlers may call back into the peer through it.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// The peer sent no id
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One-shot completion handle given to non-blocking handlers.
///
/// Consumed by the first `respond`; safe to move to another thread or task.
/// Once the connection is closed, responding is a no-op.
pub struct Responder {
    connection: WeakConnection,
    method: String,
    /// `None` when no response is owed (notification)
    id: Option<RequestId>,
    diagnostics: Diagnostics,
    completed: bool,
}

impl Responder {
    pub(crate) fn new(
        connection: WeakConnection,
        method: String,
        id: Option<RequestId>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            connection,
            method,
            id,
            diagnostics,
            completed: false,
        }
    }

    pub fn respond(mut self, outcome: Result<Value, HandlerError>) {
        self.completed = true;
        let outcome = outcome.map_err(|e| e.to_error_object());
        match self.connection.upgrade() {
            Some(connection) => {
                complete(&connection, &self.diagnostics, &self.method, self.id.take(), outcome)
            }
            None => debug!(method = %self.method, "Connection gone, dropping deferred response"),
        }
    }

    pub fn success(self, result: Value) {
        self.respond(Ok(result))
    }

    pub fn error(self, error: impl Into<HandlerError>) {
        self.respond(Err(error.into()))
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Some(id) = self.id.take() {
            self.diagnostics.report(Diagnostic::ResponderDropped {
                method: self.method.clone(),
                id,
            });
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("method", &self.method)
            .field("id", &self.id)
            .finish()
    }
}

/// Resolves inbound requests against the registry and enforces each method's policy
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<MethodRegistry>,
    diagnostics: Diagnostics,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<MethodRegistry>, diagnostics: Diagnostics) -> Self {
        Self {
            registry,
            diagnostics,
        }
    }

    pub(crate) fn dispatch(&self, connection: &Connection, request: InboundRequest) {
        let InboundRequest { id, method, params } = request;
        trace!(%method, ?id, "Dispatching request");

        let Some(entry) = self.registry.resolve(&method) else {
            let error = JsonRpcErrorObject::method_not_found(&method);
            return complete(connection, &self.diagnostics, &method, id, Err(error));
        };

        // A notification-only method never answers, even when the peer sent an id
        let reply_id = if entry.options.notification { None } else { id.clone() };

        if let Some(required) = &entry.options.state {
            let actual = connection.effective_state();
            if actual.as_deref() != Some(required.as_str()) {
                let error = JsonRpcErrorObject::invalid_state(&method, required, actual.as_deref());
                return complete(connection, &self.diagnostics, &method, reply_id, Err(error));
            }
        }

        let params = match shape_params(params, entry.options.by_name) {
            Ok(params) => params,
            Err(error) => {
                return complete(connection, &self.diagnostics, &method, reply_id, Err(error));
            }
        };

        let cx = CallContext {
            connection: connection.clone(),
            method: method.clone(),
            id,
        };

        match &entry.handler {
            Handler::Blocking(handler) => {
                let outcome = handler.handle(&cx, params).map_err(|e| e.to_error_object());
                complete(connection, &self.diagnostics, &method, reply_id, outcome);
            }
            Handler::Deferred(handler) => {
                let responder = Responder::new(
                    connection.downgrade(),
                    method.clone(),
                    reply_id,
                    self.diagnostics.clone(),
                );
                handler.handle(&cx, params, responder);
            }
        }
    }
}

/// Match the inbound params against the method's declared convention.
/// Omitted params become an empty value of the expected kind.
fn shape_params(params: Option<Params>, by_name: bool) -> Result<Params, JsonRpcErrorObject> {
    match params {
        None => Ok(Params::empty(by_name)),
        Some(params) if params.is_by_name() == by_name => Ok(params),
        Some(params) => Err(JsonRpcErrorObject::invalid_params(&format!(
            "expected {} params, got {}",
            if by_name { "object" } else { "array" },
            params.kind()
        ))),
    }
}

/// Send the outcome when a response is owed; otherwise report failures locally
fn complete(
    connection: &Connection,
    diagnostics: &Diagnostics,
    method: &str,
    reply_id: Option<RequestId>,
    outcome: Result<Value, JsonRpcErrorObject>,
) {
    match reply_id {
        Some(id) => {
            if let Err(e) = connection.send_outcome(id, outcome) {
                debug!(%method, error = %e, "Could not send response");
            }
        }
        None => {
            if let Err(error) = outcome {
                diagnostics.report(Diagnostic::NotificationFailed {
                    method: method.to_string(),
                    error,
                });
            }
        }
    }
}
