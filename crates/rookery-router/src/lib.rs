//! # rookery-router
//!
//! Local-domain stanza routing and IQ correlation engine for the Rookery
//! messaging server.
//!
//! This crate decides the fate of every stanza addressed to a domain the
//! server is authoritative for: delivery to a user session, dispatch to a
//! registered query handler, resolution of a pending request/reply
//! correlation, or the fallback delivery-hook chain. It also owns the
//! bookkeeping for the server's own outgoing queries, matching inbound
//! replies to callbacks with a bounded wait.
//!
//! ## Architecture
//!
//! - **LocalRouter**: the routing decision engine; runs on whatever worker
//!   receives the stanza, never serialized
//! - **HandlerRegistry**: `(domain, namespace)` to query handler, lock-free
//!   reads
//! - **ResponseCorrelator**: outstanding queries by correlation id, with
//!   exactly-once reply/timeout delivery
//! - **Control actor**: one task consuming registry mutations and timer
//!   expiries in arrival order
//! - **LocalService**: wires the above together for embedding
//!
//! Wire parsing, session delivery, hook-chain execution and handler
//! dispatch policy belong to the embedding server and are reached through
//! the [`RouterState`] trait.

pub mod actor;
pub mod correlator;
pub mod disco;
pub mod hooks;
pub mod ping;
pub mod registry;
pub mod router;
pub mod service;

mod error;
mod stanza;

pub use actor::ControlHandle;
pub use correlator::{
    CorrelationEntry, IqOutcome, ReplyHandler, ResponseCallback, ResponseCorrelator,
    DEFAULT_IQ_TIMEOUT,
};
pub use error::{RouterError, StanzaError, StanzaErrorCondition, StanzaErrorType};
pub use hooks::{HookEvent, HookVerdict};
pub use registry::{
    DispatchPolicy, HandlerEntry, HandlerKey, HandlerOptions, HandlerRegistry, IqHandler,
};
pub use router::LocalRouter;
pub use service::{LocalService, RouterConfig};
pub use stanza::{
    Iq, IqType, Message, MessageType, Presence, PresenceType, Stanza, StanzaKind,
};

use std::future::Future;

use jid::Jid;

/// Collaborator surface the routing engine needs from the embedding server.
///
/// All methods are fire-and-forget from the router's point of view: none of
/// them may block indefinitely, and their failures are their own to handle.
pub trait RouterState: Send + Sync + 'static {
    /// Route a stanza outbound (toward its recipient, wherever that is).
    /// Also used for the error replies the router emits itself.
    fn route(&self, from: &Jid, to: &Jid, stanza: Stanza) -> impl Future<Output = ()> + Send;

    /// Deliver a stanza to a specific local user's active session(s).
    fn deliver_to_session(
        &self,
        from: &Jid,
        to: &Jid,
        stanza: Stanza,
    ) -> impl Future<Output = ()> + Send;

    /// Run the pluggable delivery-hook chain for `event` on `domain`.
    /// [`hooks::bounce_unaddressed`] is the expected default hook.
    fn run_delivery_hooks(
        &self,
        event: HookEvent,
        domain: &str,
        from: &Jid,
        to: &Jid,
        stanza: Stanza,
    ) -> impl Future<Output = ()> + Send;

    /// Invoke a registered query handler. Dispatch policy (inline, queued,
    /// parallel) is the implementor's choice; [`router::invoke_handler`]
    /// provides the mechanics of running the handler and routing its reply.
    fn dispatch_iq(
        &self,
        domain: &str,
        entry: HandlerEntry,
        from: &Jid,
        to: &Jid,
        iq: Iq,
    ) -> impl Future<Output = ()> + Send;
}
