//! One endpoint of a bidirectional JSON-RPC conversation.
//!
//! A [`Connection`] owns no transport. Outbound text goes through the
//! [`OutputSink`] given at construction, inbound text is fed to
//! [`Connection::handle`]. The same connection both issues calls and serves
//! the peer's calls.
//!
//! ```
//! use serde_json::json;
//! use turul_json_rpc_peer::{Engine, MethodOptions};
//!
//! let engine = Engine::default();
//! engine
//!     .register_method("ping", MethodOptions::new(), |_cx, _params| Ok(json!("pong")))
//!     .unwrap();
//!
//! let connection = engine
//!     .connection()
//!     .output(|text: String| println!("-> {}", text))
//!     .build()
//!     .unwrap();
//!
//! connection
//!     .handle(r#"{"jsonrpc":"2.0","method":"ping","params":{},"id":1}"#)
//!     .unwrap();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::codec::encode_message;
use crate::diagnostics::Diagnostic;
use crate::engine::EngineShared;
use crate::error::{JsonRpcError, JsonRpcErrorObject, PeerError, ToJsonRpcError};
use crate::message::{InboundResponse, IncomingMessage, InvalidMessage, parse_message};
use crate::notification::JsonRpcNotification;
use crate::pending::{CallResult, CorrelationTable, ResponseCallback, generate_call_id};
use crate::request::{JsonRpcRequest, Params};
use crate::response::JsonRpcMessage;
use crate::types::RequestId;

/// Destination for outbound message text
pub trait OutputSink: Send + Sync {
    fn send(&self, text: String);
}

impl<F> OutputSink for F
where
    F: Fn(String) + Send + Sync,
{
    fn send(&self, text: String) {
        self(text)
    }
}

/// The application object a connection belongs to
pub trait ConnectionOwner: Send + Sync {
    /// State consulted by state-gated methods. `None` defers to the
    /// connection's own state tag.
    fn state(&self) -> Option<String> {
        None
    }
}

fn downgrade_owner<O: ConnectionOwner + 'static>(owner: &Arc<O>) -> Weak<dyn ConnectionOwner> {
    Arc::<O>::downgrade(owner)
}

struct ConnectionInner {
    engine: Arc<EngineShared>,
    state: RwLock<Option<String>>,
    owner: RwLock<Option<Weak<dyn ConnectionOwner>>>,
    /// `None` once closed
    sink: RwLock<Option<Arc<dyn OutputSink>>>,
    pending: CorrelationTable,
    next_sequence: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

/// Non-owning handle, used by deferred responders
#[derive(Clone)]
pub struct WeakConnection {
    inner: Weak<ConnectionInner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

impl Connection {
    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // === state / owner ===

    pub fn state(&self) -> Option<String> {
        self.inner.state.read().clone()
    }

    pub fn set_state(&self, state: impl Into<String>) {
        let state = state.into();
        debug!(%state, "Connection state changed");
        *self.inner.state.write() = Some(state);
    }

    pub fn clear_state(&self) {
        *self.inner.state.write() = None;
    }

    /// The owner's state when it reports one, else this connection's tag
    pub fn effective_state(&self) -> Option<String> {
        self.owner()
            .and_then(|owner| owner.state())
            .or_else(|| self.state())
    }

    pub fn owner(&self) -> Option<Arc<dyn ConnectionOwner>> {
        self.inner.owner.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_owner<O: ConnectionOwner + 'static>(&self, owner: &Arc<O>) {
        *self.inner.owner.write() = Some(downgrade_owner(owner));
    }

    // === outbound ===

    /// Call `method` on the peer. `callback` fires at most once, with the
    /// peer's result or error object. Returns the generated call id.
    pub fn call<F>(&self, method: &str, args: Value, callback: F) -> Result<RequestId, PeerError>
    where
        F: FnOnce(CallResult) + Send + 'static,
    {
        self.call_boxed(method, args, Box::new(callback))
    }

    /// Call `method` and silently discard the eventual response
    pub fn call_ignoring_response(
        &self,
        method: &str,
        args: Value,
    ) -> Result<RequestId, PeerError> {
        self.call_boxed(method, args, Box::new(|_| {}))
    }

    /// Call `method` and await the response
    pub fn request(&self, method: &str, args: Value) -> Result<PendingResponse, PeerError> {
        let (tx, rx) = oneshot::channel();
        let id = self.call(method, args, move |result| {
            let _ = tx.send(result);
        })?;
        Ok(PendingResponse { id, rx })
    }

    fn call_boxed(
        &self,
        method: &str,
        args: Value,
        callback: ResponseCallback,
    ) -> Result<RequestId, PeerError> {
        self.ensure_open()?;
        let params = Params::try_from(args)?;

        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst);
        let callback_identity = &*callback as *const (dyn FnOnce(CallResult) + Send) as *const ()
            as usize;
        let id = generate_call_id(
            &self.inner.engine.config.call_id_prefix,
            sequence,
            method,
            &params,
            callback_identity,
        );

        // registered before the write so a synchronous reply finds it
        self.inner.pending.insert(id.clone(), callback)?;

        debug!(%id, %method, "Sending request");
        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.write(&request) {
            self.inner.pending.take(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Send a notification. No response can ever be correlated with it.
    pub fn notify(&self, method: &str, args: Value) -> Result<(), PeerError> {
        self.ensure_open()?;
        let params = Params::try_from(args)?;
        debug!(%method, "Sending notification");
        self.write(&JsonRpcNotification::new(method, params))
    }

    /// Forget a pending call without firing its callback
    pub fn abandon(&self, id: &RequestId) -> bool {
        let removed = self.inner.pending.take(id).is_some();
        if removed {
            debug!(%id, "Abandoned pending call");
        }
        removed
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.inner.pending.contains(id)
    }

    // === inbound ===

    /// Process one inbound message.
    ///
    /// Protocol violations are answered with an "invalid request" error
    /// response and returned. Dispatch failures are answered to the peer
    /// and are not errors here; neither is a response for an unknown call.
    pub fn handle(&self, text: &str) -> Result<(), PeerError> {
        self.ensure_open()?;
        trace!(message = %text, "Received message");

        let value = match self.inner.engine.codec.decode(text) {
            Ok(value) => value,
            Err(e) => return self.reject(None, PeerError::Decode(e.to_string())),
        };

        match parse_message(value) {
            Ok(IncomingMessage::Request(request)) => {
                self.inner.engine.dispatcher.dispatch(self, request);
                Ok(())
            }
            Ok(IncomingMessage::Response(response)) => {
                self.deliver(response);
                Ok(())
            }
            Ok(IncomingMessage::UncorrelatedError(error)) => {
                self.inner
                    .engine
                    .diagnostics
                    .report(Diagnostic::PeerReportedError { error });
                Ok(())
            }
            Err(InvalidMessage { id, error }) => {
                if let (Some(id), PeerError::InvalidErrorObject(reason)) = (&id, &error) {
                    // the caller is still owed an outcome for its call
                    if let Some(callback) = self.inner.pending.take(id) {
                        callback(Err(JsonRpcErrorObject::invalid_request(Some(
                            Value::String(reason.clone()),
                        ))));
                    }
                }
                self.reject(id, error)
            }
        }
    }

    fn deliver(&self, response: InboundResponse) {
        let InboundResponse { id, outcome } = response;
        let Some(callback) = self.inner.pending.take(&id) else {
            self.inner
                .engine
                .diagnostics
                .report(Diagnostic::UnknownCall { id });
            return;
        };
        if self.is_closed() {
            return;
        }
        debug!(%id, is_error = outcome.is_err(), "Delivering response");
        callback(outcome);
    }

    fn reject(&self, id: Option<RequestId>, error: PeerError) -> Result<(), PeerError> {
        self.inner
            .engine
            .diagnostics
            .report(Diagnostic::ProtocolViolation {
                id: id.clone(),
                reason: error.to_string(),
            });
        let response = JsonRpcError::new(id, error.to_error_object());
        if let Err(e) = self.write(&response) {
            debug!(error = %e, "Could not report protocol violation");
        }
        Err(error)
    }

    /// Write the response owed for request `id`
    pub(crate) fn send_outcome(
        &self,
        id: RequestId,
        outcome: Result<Value, JsonRpcErrorObject>,
    ) -> Result<(), PeerError> {
        debug!(%id, is_error = outcome.is_err(), "Sending response");
        self.write(&JsonRpcMessage::from_outcome(id, outcome))
    }

    fn write<T: Serialize>(&self, message: &T) -> Result<(), PeerError> {
        let text = encode_message(self.inner.engine.codec.as_ref(), message)
            .map_err(|e| PeerError::Encode(e.to_string()))?;
        // clone the sink out so no lock is held while the transport runs
        let sink = self.inner.sink.read().clone().ok_or(PeerError::Closed)?;
        trace!(message = %text, "Writing message");
        sink.send(text);
        Ok(())
    }

    // === lifecycle ===

    /// Close the connection. Pending calls are abandoned without firing;
    /// every later operation fails with [`PeerError::Closed`]. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let abandoned = self.inner.pending.clear();
        self.inner.sink.write().take();
        self.inner.owner.write().take();
        debug!(abandoned, "Connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), PeerError> {
        if self.is_closed() {
            Err(PeerError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Future resolving to the response of a [`Connection::request`] call
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<CallResult>,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value, PeerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(result))) => Poll::Ready(Ok(result)),
            Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(PeerError::Remote(error))),
            // sender dropped: closed or abandoned
            Poll::Ready(Err(_)) => Poll::Ready(Err(PeerError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Builder returned by [`Engine::connection`](crate::Engine::connection)
pub struct ConnectionBuilder {
    engine: Arc<EngineShared>,
    owner: Option<Weak<dyn ConnectionOwner>>,
    sink: Option<Arc<dyn OutputSink>>,
    state: Option<String>,
}

impl ConnectionBuilder {
    pub(crate) fn new(engine: Arc<EngineShared>) -> Self {
        Self {
            engine,
            owner: None,
            sink: None,
            state: None,
        }
    }

    pub fn owner<O: ConnectionOwner + 'static>(mut self, owner: &Arc<O>) -> Self {
        self.owner = Some(downgrade_owner(owner));
        self
    }

    pub fn output<S: OutputSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn initial_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Build the connection. An output sink is required.
    pub fn build(self) -> Result<Connection, PeerError> {
        let sink = self
            .sink
            .ok_or_else(|| PeerError::Config("connection requires an output sink".to_string()))?;
        let pending = CorrelationTable::new(self.engine.config.max_pending_calls);

        Ok(Connection {
            inner: Arc::new(ConnectionInner {
                engine: self.engine,
                state: RwLock::new(self.state),
                owner: RwLock::new(self.owner),
                sink: RwLock::new(Some(sink)),
                pending,
                next_sequence: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }
}
