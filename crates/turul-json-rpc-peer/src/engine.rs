//! Engine: the method registry and settings shared by a family of connections.

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{Codec, JsonCodec};
use crate::config::EngineConfig;
use crate::connection::ConnectionBuilder;
use crate::diagnostics::{Diagnostic, DiagnosticHook, Diagnostics};
use crate::dispatch::{CallContext, Dispatcher, Responder};
use crate::error::{HandlerError, PeerError};
use crate::registry::{Handler, MethodOptions, MethodRegistry};
use crate::request::Params;

pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) registry: Arc<MethodRegistry>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) diagnostics: Diagnostics,
}

/// Entry point: registers methods and creates connections.
///
/// Cloning an engine is cheap; clones share the registry.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, PeerError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.shared.registry
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Handler,
        options: MethodOptions,
    ) -> Result<(), PeerError> {
        self.shared.registry.register(name, handler, options)
    }

    pub fn register_method<F>(
        &self,
        name: impl Into<String>,
        options: MethodOptions,
        f: F,
    ) -> Result<(), PeerError>
    where
        F: Fn(&CallContext, Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.shared.registry.register_method(name, options, f)
    }

    pub fn register_deferred<F>(
        &self,
        name: impl Into<String>,
        options: MethodOptions,
        f: F,
    ) -> Result<(), PeerError>
    where
        F: Fn(&CallContext, Params, Responder) + Send + Sync + 'static,
    {
        self.shared.registry.register_deferred(name, options, f)
    }

    fn assemble(
        config: EngineConfig,
        codec: Arc<dyn Codec>,
        registry: Arc<MethodRegistry>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config,
                codec,
                dispatcher: Dispatcher::new(registry.clone(), diagnostics.clone()),
                registry,
                diagnostics,
            }),
        }
    }

    /// Start building a connection bound to this engine's registry
    pub fn connection(&self) -> ConnectionBuilder {
        ConnectionBuilder::new(self.shared.clone())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::assemble(
            EngineConfig::default(),
            Arc::new(JsonCodec),
            Arc::default(),
            Diagnostics::default(),
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("registry", &self.shared.registry)
            .finish()
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    codec: Option<Arc<dyn Codec>>,
    registry: Option<Arc<MethodRegistry>>,
    diagnostics: Option<DiagnosticHook>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Share an existing registry instead of creating a fresh one
    pub fn registry(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Receive locally-observable events (unknown calls, failed notifications, ...)
    pub fn diagnostics<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        self.diagnostics = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Engine, PeerError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Engine::assemble(
            config,
            self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            self.registry.unwrap_or_default(),
            Diagnostics::new(self.diagnostics),
        ))
    }
}
