//! Query-handler registry for domain-scoped IQ dispatch.
//!
//! This module provides a thread-safe registry mapping `(domain, namespace)`
//! keys to registered query handlers.
//!
//! ## Architecture
//!
//! Lookups run lock-free on whatever worker is routing the stanza; mutations
//! are funneled through the control actor so interleaved register/unregister
//! pairs for the same key cannot race destructively.
//!
//! ```text
//! routing workers --- lookup ---> DashMap<HandlerKey, HandlerEntry>
//!                                        ^
//! control actor ---- insert/remove ------/
//! ```

mod handler_registry;

pub use handler_registry::{
    DispatchPolicy, HandlerEntry, HandlerKey, HandlerOptions, HandlerRegistry, IqHandler,
};
