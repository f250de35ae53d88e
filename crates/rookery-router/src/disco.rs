//! Service-discovery introspection over the handler registry.
//!
//! A domain's advertised features are the query namespaces its registered
//! handlers answer. The scan is a pure read: it is safe to run concurrently
//! with registrations and reflects a per-entry point-in-time view, not an
//! atomic snapshot of the whole registry.

use crate::registry::HandlerRegistry;

/// List the query namespaces registered for `domain`, ascending, without
/// duplicates.
pub fn features(registry: &HandlerRegistry, domain: &str) -> Vec<String> {
    registry.namespaces(domain)
}
