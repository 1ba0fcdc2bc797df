//! Method registry: method name -> handler + invocation policy.
//!
//! One registry is shared by every connection an [`Engine`](crate::Engine)
//! creates. Registration may happen at any time; dispatch resolves the entry
//! under a read lock and releases it before the handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::dispatch::{CallContext, Responder};
use crate::error::{HandlerError, PeerError};
use crate::request::Params;

/// A method that produces its result before returning
pub trait MethodHandler: Send + Sync {
    fn handle(&self, cx: &CallContext, params: Params) -> Result<Value, HandlerError>;
}

/// A method that completes through a [`Responder`], now or later
pub trait DeferredMethodHandler: Send + Sync {
    fn handle(&self, cx: &CallContext, params: Params, responder: Responder);
}

struct FnHandler<F>(F);

impl<F> MethodHandler for FnHandler<F>
where
    F: Fn(&CallContext, Params) -> Result<Value, HandlerError> + Send + Sync,
{
    fn handle(&self, cx: &CallContext, params: Params) -> Result<Value, HandlerError> {
        (self.0)(cx, params)
    }
}

struct FnDeferredHandler<F>(F);

impl<F> DeferredMethodHandler for FnDeferredHandler<F>
where
    F: Fn(&CallContext, Params, Responder) + Send + Sync,
{
    fn handle(&self, cx: &CallContext, params: Params, responder: Responder) {
        (self.0)(cx, params, responder)
    }
}

#[derive(Clone)]
pub enum Handler {
    Blocking(Arc<dyn MethodHandler>),
    Deferred(Arc<dyn DeferredMethodHandler>),
}

impl Handler {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&CallContext, Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Handler::Blocking(Arc::new(FnHandler(f)))
    }

    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&CallContext, Params, Responder) + Send + Sync + 'static,
    {
        Handler::Deferred(Arc::new(FnDeferredHandler(f)))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Handler::Deferred(_))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Blocking(_) => f.write_str("Handler::Blocking"),
            Handler::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}

/// Invocation policy of a registered method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOptions {
    /// Arguments arrive as a name -> value mapping (`false`: positional array)
    pub by_name: bool,
    /// The handler completes through a [`Responder`]
    pub non_blocking: bool,
    /// Never answer, whatever the handler produces
    pub notification: bool,
    /// Accept only while the connection is in this state
    pub state: Option<String>,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            by_name: true,
            non_blocking: false,
            notification: false,
            state: None,
        }
    }
}

impl MethodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self) -> Self {
        self.by_name = false;
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.non_blocking = true;
        self
    }

    pub fn notification(mut self) -> Self {
        self.notification = true;
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub handler: Handler,
    pub options: MethodOptions,
}

#[derive(Default)]
pub struct MethodRegistry {
    methods: RwLock<HashMap<String, Arc<MethodEntry>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous entry.
    ///
    /// `options.non_blocking` must agree with the handler kind; a mismatch
    /// is a programming error reported as [`PeerError::Config`].
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Handler,
        options: MethodOptions,
    ) -> Result<(), PeerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PeerError::Config("method name must not be empty".to_string()));
        }
        if options.non_blocking != handler.is_deferred() {
            return Err(PeerError::Config(format!(
                "method '{}': non_blocking={} does not match a {:?}",
                name, options.non_blocking, handler
            )));
        }

        debug!(method = %name, ?options, "Registering method");
        let previous = self
            .methods
            .write()
            .insert(name.clone(), Arc::new(MethodEntry { handler, options }));
        if previous.is_some() {
            debug!(method = %name, "Replaced existing method registration");
        }
        Ok(())
    }

    /// Register a synchronous handler closure
    pub fn register_method<F>(
        &self,
        name: impl Into<String>,
        options: MethodOptions,
        f: F,
    ) -> Result<(), PeerError>
    where
        F: Fn(&CallContext, Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let options = MethodOptions {
            non_blocking: false,
            ..options
        };
        self.register(name, Handler::blocking(f), options)
    }

    /// Register a handler closure that answers through a [`Responder`]
    pub fn register_deferred<F>(
        &self,
        name: impl Into<String>,
        options: MethodOptions,
        f: F,
    ) -> Result<(), PeerError>
    where
        F: Fn(&CallContext, Params, Responder) + Send + Sync + 'static,
    {
        let options = MethodOptions {
            non_blocking: true,
            ..options
        };
        self.register(name, Handler::deferred(f), options)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<MethodEntry>> {
        self.methods.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.methods.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}
