//! Stanza routing for the local domain.
//!
//! The `LocalRouter` decides the fate of every stanza addressed to a domain
//! this server is authoritative for.
//!
//! # Routing Logic
//!
//! For each stanza, in order:
//! 1. A non-empty user part means the stanza is for a user's active
//!    session(s): delegate to session delivery
//! 2. A query (`get`/`set` IQ) addressed to the bare domain is processed
//!    against the handler registry
//! 3. A reply (`result`/`error` IQ) is matched against the response
//!    correlator; unmatched replies are stale duplicates and dropped
//! 4. Everything else goes to the delivery-hook chain
//!
//! The router runs directly on whichever worker received the stanza; it
//! holds no queue of its own and concurrent `route` calls do not block each
//! other. Failures are converted into outbound protocol-error replies or
//! logged and dropped; nothing propagates to the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jid::Jid;
use tracing::{debug, error, instrument};

use crate::correlator::{IqOutcome, ResponseCorrelator};
use crate::error::StanzaError;
use crate::hooks::HookEvent;
use crate::registry::{HandlerEntry, HandlerRegistry};
use crate::stanza::{Iq, Stanza};
use crate::RouterState;

/// Routing decision engine for locally-addressed stanzas.
pub struct LocalRouter<S: RouterState> {
    registry: Arc<HandlerRegistry>,
    correlator: Arc<ResponseCorrelator>,
    state: Arc<S>,
}

impl<S: RouterState> LocalRouter<S> {
    /// Create a new local router.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        correlator: Arc<ResponseCorrelator>,
        state: Arc<S>,
    ) -> Self {
        Self {
            registry,
            correlator,
            state,
        }
    }

    /// Route one inbound locally-addressed stanza.
    ///
    /// Never fails toward its caller: malformed traffic is answered with
    /// protocol errors, stale replies are dropped, and an unexpected fault
    /// (a panicking handler or collaborator) is caught here, logged with
    /// its addressing context, and swallowed so one bad stanza cannot
    /// affect other traffic on the routing path.
    #[instrument(
        name = "local.route",
        skip(self, stanza),
        fields(from = %from, to = %to, kind = %stanza.kind())
    )]
    pub async fn route(&self, from: &Jid, to: &Jid, stanza: Stanza) {
        let kind = stanza.kind();
        if let Err(panic) = AssertUnwindSafe(self.do_route(from, to, stanza))
            .catch_unwind()
            .await
        {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                from = %from,
                to = %to,
                kind = %kind,
                reason = %reason,
                "unexpected failure while routing stanza, dropped"
            );
        }
    }

    async fn do_route(&self, from: &Jid, to: &Jid, stanza: Stanza) {
        if to.node().is_some() {
            self.state.deliver_to_session(from, to, stanza).await;
            return;
        }

        match stanza {
            Stanza::Iq(iq) if iq.is_request() && to.resource().is_none() => {
                self.process_iq(from, to, iq).await;
            }
            Stanza::Iq(iq) if iq.is_reply() => {
                self.process_iq_reply(iq);
            }
            other => {
                self.state
                    .run_delivery_hooks(
                        HookEvent::UnaddressedResourceDelivery,
                        to.domain().as_str(),
                        from,
                        to,
                        other,
                    )
                    .await;
            }
        }
    }

    /// Process a query addressed to the bare domain.
    ///
    /// A well-formed query carries exactly one payload element; its
    /// namespace selects the handler.
    async fn process_iq(&self, from: &Jid, to: &Jid, iq: Iq) {
        match iq.payloads.len() {
            1 => {
                let namespace = iq.payloads[0].ns();
                match self.registry.lookup(to.domain().as_str(), &namespace) {
                    Some(entry) => {
                        debug!(namespace = %namespace, "dispatching query to registered handler");
                        self.state
                            .dispatch_iq(to.domain().as_str(), entry, from, to, iq)
                            .await;
                    }
                    None => {
                        debug!(namespace = %namespace, "no handler registered for query namespace");
                        route_error(
                            &*self.state,
                            to,
                            from,
                            &Stanza::Iq(iq),
                            StanzaError::service_unavailable(Some(
                                "No module is handling this query".to_string(),
                            )),
                        )
                        .await;
                    }
                }
            }
            0 => {
                route_error(
                    &*self.state,
                    to,
                    from,
                    &Stanza::Iq(iq),
                    StanzaError::bad_request(Some("No child elements found".to_string())),
                )
                .await;
            }
            _ => {
                route_error(
                    &*self.state,
                    to,
                    from,
                    &Stanza::Iq(iq),
                    StanzaError::bad_request(Some("Too many child elements".to_string())),
                )
                .await;
            }
        }
    }

    /// Match a reply against the correlator. An unmatched reply is a stale
    /// or duplicate one and is silently dropped.
    fn process_iq_reply(&self, iq: Iq) {
        match self.correlator.resolve(&iq.id) {
            Some(entry) => entry.invoke(IqOutcome::Reply(iq)),
            None => debug!(id = %iq.id, "no pending query for reply, dropping"),
        }
    }
}

/// Build an error reply to `original` and route it from `from` back to
/// `to`, preserving the original's payloads and language tag.
///
/// Error-typed stanzas are never answered with another error; the reply is
/// dropped instead to keep two faulty endpoints from bouncing errors back
/// and forth.
pub async fn route_error<S: RouterState>(
    state: &S,
    from: &Jid,
    to: &Jid,
    original: &Stanza,
    error: StanzaError,
) {
    if original.is_error() {
        debug!("refusing to answer an error stanza with an error");
        return;
    }
    let reply = original.error_reply(error);
    state.route(from, to, reply).await;
}

/// Handler-invocation mechanics: run the handler and route its reply, if
/// any, back to the query's sender.
///
/// [`crate::RouterState::dispatch_iq`] implementations call this inline or
/// from whatever execution context their dispatch policy dictates.
pub async fn invoke_handler<S: RouterState>(
    state: &S,
    entry: &HandlerEntry,
    from: &Jid,
    to: &Jid,
    iq: Iq,
) {
    if let Some(reply) = entry.handler.handle_iq(from, to, iq).await {
        state.route(to, from, Stanza::Iq(reply)).await;
    }
}
