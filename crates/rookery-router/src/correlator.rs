//! Response Correlator implementation.
//!
//! Tracks outstanding outbound queries by correlation identifier so that an
//! inbound reply, a timeout, or an explicit cancellation consumes each entry
//! exactly once. The exactly-once guarantee comes from the atomicity of the
//! map's get-and-remove, never from timer cancellation: aborting the expiry
//! timer is a best-effort optimization, and an expiry signal that already
//! fired simply finds no entry and does nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::stanza::Iq;

/// Default bounded lifetime of an outstanding query.
pub const DEFAULT_IQ_TIMEOUT: Duration = Duration::from_secs(32);

/// What happened to an outstanding query: the reply arrived, or the entry's
/// bounded lifetime elapsed first.
#[derive(Debug)]
pub enum IqOutcome {
    /// The correlated reply (`result` or `error` IQ)
    Reply(Iq),
    /// No reply arrived within the entry's lifetime
    Timeout,
}

impl IqOutcome {
    /// Whether this outcome is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Bound-method reply target: a long-lived context that receives outcomes
/// for the operations it has in flight.
pub trait ReplyHandler: Send + Sync + 'static {
    /// Receive the outcome of the query registered under `operation`.
    fn handle_reply(&self, operation: &str, outcome: IqOutcome);
}

/// Callback invoked with the outcome of an outstanding query.
///
/// Either a single-shot closure or a bound-method pair (context reference
/// plus operation name). Invoked at most once, after the entry has already
/// been removed from the table.
pub enum ResponseCallback {
    /// Free-standing single-shot closure
    Once(Box<dyn FnOnce(IqOutcome) + Send + Sync + 'static>),
    /// Bound method on a long-lived context
    Bound {
        /// The context to call back into
        target: Arc<dyn ReplyHandler>,
        /// Operation name passed back to the context
        operation: String,
    },
}

impl ResponseCallback {
    /// Create a single-shot closure callback.
    pub fn once(f: impl FnOnce(IqOutcome) + Send + Sync + 'static) -> Self {
        Self::Once(Box::new(f))
    }

    /// Create a bound-method callback.
    pub fn bound(target: Arc<dyn ReplyHandler>, operation: impl Into<String>) -> Self {
        Self::Bound {
            target,
            operation: operation.into(),
        }
    }

    fn invoke(self, outcome: IqOutcome) {
        match self {
            Self::Once(f) => f(outcome),
            Self::Bound { target, operation } => target.handle_reply(&operation, outcome),
        }
    }
}

impl fmt::Debug for ResponseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once(_) => f.write_str("ResponseCallback::Once"),
            Self::Bound { operation, .. } => f
                .debug_struct("ResponseCallback::Bound")
                .field("operation", operation)
                .finish_non_exhaustive(),
        }
    }
}

/// One outstanding query: its callback and the handle of its expiry timer.
#[derive(Debug)]
pub struct CorrelationEntry {
    callback: ResponseCallback,
    timer: JoinHandle<()>,
}

impl CorrelationEntry {
    /// Invoke the stored callback with the given outcome, consuming the
    /// entry.
    pub fn invoke(self, outcome: IqOutcome) {
        self.callback.invoke(outcome);
    }
}

/// Table of outstanding queries keyed by correlation identifier.
///
/// `resolve` and `cancel` may run on any worker; timer expiry signals are
/// drained by the control actor, which calls `expire`. All three paths
/// consume entries through the same atomic get-and-remove, so for any
/// identifier exactly one of them wins.
pub struct ResponseCorrelator {
    entries: DashMap<String, CorrelationEntry>,
    expiry_tx: mpsc::UnboundedSender<String>,
}

impl ResponseCorrelator {
    /// Create a correlator and the receiving end of its expiry queue.
    ///
    /// The receiver must be drained (normally by the control actor) for
    /// timeouts to be delivered.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                entries: DashMap::new(),
                expiry_tx,
            }),
            expiry_rx,
        )
    }

    /// Register an outstanding query.
    ///
    /// `timeout` of `None` or zero falls back to [`DEFAULT_IQ_TIMEOUT`].
    /// The identifier must be unique among currently outstanding entries: a
    /// collision silently overwrites the previous entry's storage and
    /// orphans its timer, which will then consume the new entry early.
    /// Callers must not reuse identifiers for distinct in-flight queries.
    pub fn register(
        &self,
        id: impl Into<String>,
        callback: ResponseCallback,
        timeout: Option<Duration>,
    ) {
        let id = id.into();
        let timeout = effective_timeout(timeout);

        let tx = self.expiry_tx.clone();
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(timer_id);
        });

        debug!(id = %id, timeout_ms = timeout.as_millis() as u64, "registered outstanding query");
        self.entries.insert(id, CorrelationEntry { callback, timer });
    }

    /// Atomically take the entry for `id`, cancelling its expiry timer.
    ///
    /// Returns `None` when no entry exists (stale or duplicate reply); the
    /// caller then does nothing further. Timer cancellation is best-effort:
    /// an expiry signal already in flight will find the entry gone and be
    /// dropped.
    pub fn resolve(&self, id: &str) -> Option<CorrelationEntry> {
        let (_, entry) = self.entries.remove(id)?;
        entry.timer.abort();
        debug!(id = %id, "resolved outstanding query");
        Some(entry)
    }

    /// Discard the entry for `id` without invoking its callback. Idempotent
    /// if absent.
    pub fn cancel(&self, id: &str) {
        if self.resolve(id).is_some() {
            debug!(id = %id, "cancelled outstanding query");
        }
    }

    /// Timer-expiry path: if the entry is still present, consume it and
    /// deliver the timeout signal; a reply that won the race already removed
    /// it, in which case this is a no-op.
    pub(crate) fn expire(&self, id: &str) {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                debug!(id = %id, "outstanding query timed out");
                entry.invoke(IqOutcome::Timeout);
            }
            None => debug!(id = %id, "expiry signal for already-consumed query"),
        }
    }

    /// Number of currently outstanding queries.
    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for ResponseCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCorrelator")
            .field("outstanding", &self.entries.len())
            .finish()
    }
}

fn effective_timeout(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(t) if !t.is_zero() => t,
        _ => DEFAULT_IQ_TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_effective_timeout_normalization() {
        assert_eq!(effective_timeout(None), DEFAULT_IQ_TIMEOUT);
        assert_eq!(
            effective_timeout(Some(Duration::ZERO)),
            DEFAULT_IQ_TIMEOUT
        );
        assert_eq!(
            effective_timeout(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_resolve_consumes_entry_once() {
        let (correlator, _expiry_rx) = ResponseCorrelator::new();
        let invoked = Arc::new(AtomicUsize::new(0));

        let counter = invoked.clone();
        correlator.register(
            "q1",
            ResponseCallback::once(move |outcome| {
                assert!(!outcome.is_timeout());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Some(Duration::from_secs(30)),
        );
        assert_eq!(correlator.outstanding(), 1);

        let entry = correlator.resolve("q1").expect("entry should be present");
        entry.invoke(IqOutcome::Reply(Iq::result("q1")));
        assert_eq!(invoked.load(Ordering::SeqCst), 1);

        // Second resolve attempt is a no-op.
        assert!(correlator.resolve("q1").is_none());
        assert_eq!(correlator.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_cancel_discards_without_invoking() {
        let (correlator, _expiry_rx) = ResponseCorrelator::new();
        let invoked = Arc::new(AtomicUsize::new(0));

        let counter = invoked.clone();
        correlator.register(
            "q1",
            ResponseCallback::once(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );

        correlator.cancel("q1");
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(correlator.outstanding(), 0);

        // Cancelling again is harmless.
        correlator.cancel("q1");
    }

    #[tokio::test]
    async fn test_expire_delivers_timeout_signal() {
        let (correlator, _expiry_rx) = ResponseCorrelator::new();
        let timed_out = Arc::new(AtomicUsize::new(0));

        let counter = timed_out.clone();
        correlator.register(
            "q1",
            ResponseCallback::once(move |outcome| {
                assert!(outcome.is_timeout());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );

        correlator.expire("q1");
        assert_eq!(timed_out.load(Ordering::SeqCst), 1);

        // The entry is gone; a late expiry signal is a no-op.
        correlator.expire("q1");
        assert_eq!(timed_out.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expire_after_resolve_is_noop() {
        let (correlator, _expiry_rx) = ResponseCorrelator::new();
        let invoked = Arc::new(AtomicUsize::new(0));

        let counter = invoked.clone();
        correlator.register(
            "q1",
            ResponseCallback::once(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );

        let entry = correlator.resolve("q1").unwrap();
        entry.invoke(IqOutcome::Reply(Iq::result("q1")));

        correlator.expire("q1");
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timer_sends_expiry_signal() {
        let (correlator, mut expiry_rx) = ResponseCorrelator::new();
        correlator.register(
            "q1",
            ResponseCallback::once(|_| {}),
            Some(Duration::from_millis(10)),
        );

        let id = expiry_rx.recv().await.expect("timer should fire");
        assert_eq!(id, "q1");
    }

    #[tokio::test]
    async fn test_bound_callback_receives_operation_name() {
        struct Recorder(std::sync::Mutex<Vec<String>>);

        impl ReplyHandler for Recorder {
            fn handle_reply(&self, operation: &str, _outcome: IqOutcome) {
                self.0.lock().unwrap().push(operation.to_string());
            }
        }

        let recorder = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));
        let (correlator, _expiry_rx) = ResponseCorrelator::new();
        correlator.register(
            "q1",
            ResponseCallback::bound(recorder.clone(), "version-probe"),
            None,
        );

        let entry = correlator.resolve("q1").unwrap();
        entry.invoke(IqOutcome::Reply(Iq::result("q1")));

        assert_eq!(*recorder.0.lock().unwrap(), vec!["version-probe"]);
    }
}
