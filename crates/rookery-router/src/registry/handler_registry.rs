//! Handler Registry implementation.
//!
//! Maps `(domain, namespace)` to a registered query handler for IQ dispatch.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use jid::Jid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stanza::Iq;

/// Dispatch policy hint forwarded to the handler-invocation collaborator.
///
/// The registry and router treat this as opaque configuration; the embedding
/// server decides what each policy means (e.g. one ordered queue per handler
/// versus spawning a task per query).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPolicy {
    /// Queries for this handler are processed one at a time
    #[default]
    Queued,
    /// Queries for this handler may be processed concurrently
    Parallel,
}

/// Handler-specific configuration options, stored with the registration and
/// passed back on invocation and on the stop/cleanup call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOptions {
    /// Dispatch policy hint
    pub policy: DispatchPolicy,
}

/// A registered query handler.
///
/// A handler is anything that can answer a domain-scoped query; the returned
/// IQ, if any, is the reply to route back to the sender.
#[async_trait]
pub trait IqHandler: Send + Sync + 'static {
    /// Answer one query. Returns the reply to route, or `None` when the
    /// handler routes (or intentionally drops) the reply itself.
    async fn handle_iq(&self, from: &Jid, to: &Jid, iq: Iq) -> Option<Iq>;

    /// Cleanup contract, invoked once when the handler is unregistered.
    async fn stop(&self, _options: &HandlerOptions) {}
}

/// Registry key: a query handler is unique per `(domain, namespace)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    /// Addressing domain the handler serves
    pub domain: String,
    /// Payload namespace the handler answers
    pub namespace: String,
}

impl HandlerKey {
    /// Create a new handler key.
    pub fn new(domain: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.namespace)
    }
}

/// Registry value: the handler reference plus its options.
#[derive(Clone)]
pub struct HandlerEntry {
    /// The handler itself
    pub handler: Arc<dyn IqHandler>,
    /// Options stored at registration time
    pub options: HandlerOptions,
}

impl HandlerEntry {
    /// Create a new handler entry.
    pub fn new(handler: Arc<dyn IqHandler>, options: HandlerOptions) -> Self {
        Self { handler, options }
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Registry of query handlers keyed by `(domain, namespace)`.
///
/// Reads (`lookup`, `namespaces`) are safe from any number of concurrent
/// routing workers. Writes normally arrive via the control actor, which
/// serializes them; the write methods themselves are crate-internal.
pub struct HandlerRegistry {
    handlers: DashMap<HandlerKey, HandlerEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Insert a handler entry. Last writer wins: an existing entry for the
    /// same key is replaced, not rejected.
    pub(crate) fn insert(&self, key: HandlerKey, entry: HandlerEntry) -> Option<HandlerEntry> {
        let replaced = self.handlers.insert(key.clone(), entry);
        if replaced.is_some() {
            debug!(key = %key, "replaced existing handler registration");
        } else {
            debug!(key = %key, "registered handler");
        }
        replaced
    }

    /// Remove a handler entry. Idempotent if absent.
    pub(crate) fn remove(&self, key: &HandlerKey) -> Option<HandlerEntry> {
        let removed = self.handlers.remove(key);
        if removed.is_some() {
            debug!(key = %key, "unregistered handler");
        }
        removed.map(|(_, entry)| entry)
    }

    /// Look up the handler for a `(domain, namespace)` pair.
    ///
    /// Lock-free for concurrent readers; safe to call while registrations
    /// are in flight (a registration just issued may not be visible yet).
    pub fn lookup(&self, domain: &str, namespace: &str) -> Option<HandlerEntry> {
        self.handlers
            .get(&HandlerKey::new(domain, namespace))
            .map(|entry| entry.value().clone())
    }

    /// List the namespaces registered for a domain, ascending.
    pub fn namespaces(&self, domain: &str) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .handlers
            .iter()
            .filter(|entry| entry.key().domain == domain)
            .map(|entry| entry.key().namespace.clone())
            .collect();
        namespaces.sort();
        namespaces
    }

    /// Number of registered handlers across all domains.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullHandler;

    #[async_trait]
    impl IqHandler for NullHandler {
        async fn handle_iq(&self, _from: &Jid, _to: &Jid, iq: Iq) -> Option<Iq> {
            Some(iq.result_reply())
        }
    }

    struct CountingHandler(AtomicUsize);

    #[async_trait]
    impl IqHandler for CountingHandler {
        async fn handle_iq(&self, _from: &Jid, _to: &Jid, _iq: Iq) -> Option<Iq> {
            None
        }

        async fn stop(&self, _options: &HandlerOptions) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn entry() -> HandlerEntry {
        HandlerEntry::new(Arc::new(NullHandler), HandlerOptions::default())
    }

    #[test]
    fn test_lookup_absent() {
        let registry = HandlerRegistry::new();
        assert!(registry.lookup("example.org", "urn:xmpp:ping").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = HandlerRegistry::new();
        registry.insert(HandlerKey::new("example.org", "urn:xmpp:ping"), entry());

        assert!(registry.lookup("example.org", "urn:xmpp:ping").is_some());
        assert!(registry.lookup("other.org", "urn:xmpp:ping").is_none());
        assert!(registry.lookup("example.org", "jabber:iq:version").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_overwrites_existing_key() {
        let registry = HandlerRegistry::new();
        let key = HandlerKey::new("example.org", "urn:xmpp:ping");

        registry.insert(key.clone(), entry());
        let second = HandlerEntry::new(
            Arc::new(NullHandler),
            HandlerOptions {
                policy: DispatchPolicy::Parallel,
            },
        );
        let replaced = registry.insert(key, second);

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        let current = registry.lookup("example.org", "urn:xmpp:ping").unwrap();
        assert_eq!(current.options.policy, DispatchPolicy::Parallel);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = HandlerRegistry::new();
        let key = HandlerKey::new("example.org", "urn:xmpp:ping");
        registry.insert(key.clone(), entry());

        assert!(registry.remove(&key).is_some());
        assert!(registry.remove(&key).is_none());
        assert!(registry.lookup("example.org", "urn:xmpp:ping").is_none());
    }

    #[test]
    fn test_namespaces_sorted_per_domain() {
        let registry = HandlerRegistry::new();
        registry.insert(HandlerKey::new("example.org", "urn:xmpp:ping"), entry());
        registry.insert(HandlerKey::new("example.org", "jabber:iq:version"), entry());
        registry.insert(
            HandlerKey::new("example.org", "http://jabber.org/protocol/disco#info"),
            entry(),
        );
        registry.insert(HandlerKey::new("other.org", "urn:xmpp:time"), entry());

        let namespaces = registry.namespaces("example.org");
        assert_eq!(
            namespaces,
            vec![
                "http://jabber.org/protocol/disco#info".to_string(),
                "jabber:iq:version".to_string(),
                "urn:xmpp:ping".to_string(),
            ]
        );

        assert_eq!(registry.namespaces("other.org"), vec!["urn:xmpp:time"]);
        assert!(registry.namespaces("missing.org").is_empty());
    }

    #[tokio::test]
    async fn test_stop_contract_reachable_through_entry() {
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let registry = HandlerRegistry::new();
        let key = HandlerKey::new("example.org", "urn:xmpp:ping");
        registry.insert(
            key.clone(),
            HandlerEntry::new(handler.clone(), HandlerOptions::default()),
        );

        let entry = registry.remove(&key).unwrap();
        entry.handler.stop(&entry.options).await;
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }
}
