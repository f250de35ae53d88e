//! Local routing service: wiring and public surface.
//!
//! `LocalService` owns the handler registry, the response correlator, the
//! control actor and the router, and is the handle the embedding server
//! keeps for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use jid::Jid;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::actor::{spawn_control_actor, ControlHandle};
use crate::correlator::{ResponseCallback, ResponseCorrelator, DEFAULT_IQ_TIMEOUT};
use crate::disco;
use crate::error::RouterError;
use crate::registry::{HandlerEntry, HandlerKey, HandlerOptions, HandlerRegistry, IqHandler};
use crate::router::LocalRouter;
use crate::stanza::{Iq, Stanza};
use crate::RouterState;

/// Local routing service configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Domains this server is authoritative for
    pub domains: Vec<String>,
    /// Default bounded lifetime for outgoing queries
    pub iq_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            domains: vec!["localhost".to_string()],
            iq_timeout: DEFAULT_IQ_TIMEOUT,
        }
    }
}

impl RouterConfig {
    /// Create a configuration for a single authoritative domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domains: vec![domain.into()],
            ..Self::default()
        }
    }

    /// Set the authoritative domains.
    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Set the default query timeout.
    pub fn with_iq_timeout(mut self, timeout: Duration) -> Self {
        self.iq_timeout = timeout;
        self
    }

    /// Whether this server is authoritative for `domain`.
    pub fn is_local_domain(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }
}

/// The local routing service.
///
/// Created once at server start and torn down at server stop; all methods
/// are safe to call from any number of concurrent tasks.
pub struct LocalService<S: RouterState> {
    config: RouterConfig,
    registry: Arc<HandlerRegistry>,
    correlator: Arc<ResponseCorrelator>,
    router: LocalRouter<S>,
    state: Arc<S>,
    control: ControlHandle,
    shutdown: CancellationToken,
    _control_task: JoinHandle<()>,
}

impl<S: RouterState> LocalService<S> {
    /// Start the local routing service: builds the registry and correlator
    /// and spawns the control actor.
    pub fn start(config: RouterConfig, state: Arc<S>) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let (correlator, expiry_rx) = ResponseCorrelator::new();
        let shutdown = CancellationToken::new();
        let (control, control_task) = spawn_control_actor(
            registry.clone(),
            correlator.clone(),
            expiry_rx,
            shutdown.clone(),
        );
        let router = LocalRouter::new(registry.clone(), correlator.clone(), state.clone());

        info!(domains = ?config.domains, "local routing service started");

        Self {
            config,
            registry,
            correlator,
            router,
            state,
            control,
            shutdown,
            _control_task: control_task,
        }
    }

    /// Get the service configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the handler registry (read access for introspection).
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Get a clone of the control handle for out-of-band registration.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Register a query handler for `(domain, namespace)`.
    ///
    /// Idempotent upsert, last writer wins. The registration is applied by
    /// the control actor and takes effect asynchronously: it may not yet be
    /// visible to lookups when this call returns.
    pub fn register_iq_handler(
        &self,
        domain: impl Into<String>,
        namespace: impl Into<String>,
        handler: Arc<dyn IqHandler>,
        options: HandlerOptions,
    ) -> Result<(), RouterError> {
        self.control.register_handler(
            HandlerKey::new(domain, namespace),
            HandlerEntry::new(handler, options),
        )
    }

    /// Unregister the query handler for `(domain, namespace)`, running its
    /// stop contract first. Idempotent if absent; asynchronous like
    /// registration.
    pub fn unregister_iq_handler(
        &self,
        domain: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<(), RouterError> {
        self.control
            .unregister_handler(HandlerKey::new(domain, namespace))
    }

    /// Route one inbound locally-addressed stanza. See
    /// [`LocalRouter::route`].
    pub async fn route(&self, from: &Jid, to: &Jid, stanza: Stanza) {
        self.router.route(from, to, stanza).await;
    }

    /// Issue an outgoing query and register its reply callback in one step,
    /// returning immediately.
    ///
    /// The callback is invoked later, exactly once, from whichever context
    /// resolves the reply or fires the timeout. An IQ without an id gets a
    /// generated one; the (possibly generated) correlation id is returned
    /// so the caller can [`cancel_iq`](Self::cancel_iq) it. `timeout` of
    /// `None` falls back to the configured default.
    pub async fn send_iq(
        &self,
        from: &Jid,
        to: &Jid,
        mut iq: Iq,
        callback: ResponseCallback,
        timeout: Option<Duration>,
    ) -> String {
        if iq.id.is_empty() {
            iq.id = Uuid::new_v4().to_string();
        }
        let id = iq.id.clone();

        let timeout = timeout.unwrap_or(self.config.iq_timeout);
        self.correlator.register(&id, callback, Some(timeout));
        debug!(id = %id, to = %to, "issuing query");

        self.state.route(from, to, Stanza::Iq(iq)).await;
        id
    }

    /// Abandon interest in an outstanding query: the entry is discarded
    /// without invoking its callback. Idempotent if absent.
    pub fn cancel_iq(&self, id: &str) {
        self.correlator.cancel(id);
    }

    /// Number of currently outstanding queries.
    pub fn outstanding_queries(&self) -> usize {
        self.correlator.outstanding()
    }

    /// List the query namespaces registered for `domain`, ascending.
    pub fn features(&self, domain: &str) -> Vec<String> {
        disco::features(&self.registry, domain)
    }

    /// Stop the control actor. Pending mutations already queued may be
    /// dropped; routing keeps working but registrations and timeouts are no
    /// longer applied.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl<S: RouterState> std::fmt::Debug for LocalService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalService")
            .field("config", &self.config)
            .field("handlers", &self.registry.len())
            .field("outstanding", &self.correlator.outstanding())
            .finish()
    }
}
