//! Shared test support: a `RouterState` that records every collaborator
//! call and wires in the default bounce hook and inline handler dispatch.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jid::Jid;

use rookery_router::hooks::bounce_unaddressed;
use rookery_router::router::invoke_handler;
use rookery_router::{HandlerEntry, HookEvent, Iq, RouterState, Stanza};

/// One recorded stanza with its addressing envelope.
#[derive(Debug, Clone)]
pub struct RoutedStanza {
    pub from: Jid,
    pub to: Jid,
    pub stanza: Stanza,
}

/// Recording collaborator state.
///
/// `run_delivery_hooks` applies the default bounce hook and `dispatch_iq`
/// invokes the handler inline, so routing scenarios run end to end.
#[derive(Default)]
pub struct TestState {
    routed: Mutex<Vec<RoutedStanza>>,
    sessions: Mutex<Vec<RoutedStanza>>,
    dispatched: Mutex<Vec<Iq>>,
}

impl TestState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stanzas handed to outbound routing (replies and errors included).
    pub fn routed(&self) -> Vec<RoutedStanza> {
        self.routed.lock().unwrap().clone()
    }

    /// Stanzas handed to session delivery.
    pub fn sessions(&self) -> Vec<RoutedStanza> {
        self.sessions.lock().unwrap().clone()
    }

    /// Queries handed to handler dispatch.
    pub fn dispatched(&self) -> Vec<Iq> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl RouterState for TestState {
    fn route(&self, from: &Jid, to: &Jid, stanza: Stanza) -> impl Future<Output = ()> + Send {
        self.routed.lock().unwrap().push(RoutedStanza {
            from: from.clone(),
            to: to.clone(),
            stanza,
        });
        async {}
    }

    fn deliver_to_session(
        &self,
        from: &Jid,
        to: &Jid,
        stanza: Stanza,
    ) -> impl Future<Output = ()> + Send {
        self.sessions.lock().unwrap().push(RoutedStanza {
            from: from.clone(),
            to: to.clone(),
            stanza,
        });
        async {}
    }

    fn run_delivery_hooks(
        &self,
        _event: HookEvent,
        _domain: &str,
        from: &Jid,
        to: &Jid,
        stanza: Stanza,
    ) -> impl Future<Output = ()> + Send {
        let from = from.clone();
        let to = to.clone();
        async move {
            bounce_unaddressed(self, &from, &to, &stanza).await;
        }
    }

    fn dispatch_iq(
        &self,
        _domain: &str,
        entry: HandlerEntry,
        from: &Jid,
        to: &Jid,
        iq: Iq,
    ) -> impl Future<Output = ()> + Send {
        self.dispatched.lock().unwrap().push(iq.clone());
        let from = from.clone();
        let to = to.clone();
        async move {
            invoke_handler(self, &entry, &from, &to, iq).await;
        }
    }
}

/// Install a fmt subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it holds, or fail the test after ~1s.
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
