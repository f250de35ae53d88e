//! Control actor: the single serialized mutation context.
//!
//! Handler registrations, unregistrations, and correlation-timer expiries
//! are all consumed here, strictly in arrival order, so interleaved
//! mutations for the same key cannot race destructively. Routing itself
//! never passes through this task; lookups stay on the routing workers.
//!
//! Because mutations are queued, they take effect asynchronously: a caller
//! returning from [`ControlHandle::register_handler`] must not assume the
//! registration is already visible to concurrent lookups.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::correlator::ResponseCorrelator;
use crate::error::RouterError;
use crate::registry::{HandlerEntry, HandlerKey, HandlerRegistry};

/// Mutation commands consumed by the control actor.
enum Control {
    RegisterHandler {
        key: HandlerKey,
        entry: HandlerEntry,
    },
    UnregisterHandler {
        key: HandlerKey,
    },
}

/// Cloneable sender side of the control actor's mutation queue.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl ControlHandle {
    /// Enqueue a handler registration (idempotent upsert, last writer
    /// wins). Takes effect asynchronously relative to the caller.
    pub fn register_handler(
        &self,
        key: HandlerKey,
        entry: HandlerEntry,
    ) -> Result<(), RouterError> {
        self.tx
            .send(Control::RegisterHandler { key, entry })
            .map_err(|_| RouterError::ControlUnavailable)
    }

    /// Enqueue a handler unregistration. The handler's stop contract runs
    /// before the entry is removed; idempotent if absent. Takes effect
    /// asynchronously relative to the caller.
    pub fn unregister_handler(&self, key: HandlerKey) -> Result<(), RouterError> {
        self.tx
            .send(Control::UnregisterHandler { key })
            .map_err(|_| RouterError::ControlUnavailable)
    }
}

/// Spawn the control actor task.
///
/// The task drains the mutation queue and the correlator's expiry queue
/// until `shutdown` is cancelled or both queues close.
pub(crate) fn spawn_control_actor(
    registry: Arc<HandlerRegistry>,
    correlator: Arc<ResponseCorrelator>,
    mut expiry_rx: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
) -> (ControlHandle, JoinHandle<()>) {
    let (tx, mut control_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(control) = control_rx.recv() => {
                    handle_control(&registry, control).await;
                }
                Some(id) = expiry_rx.recv() => {
                    correlator.expire(&id);
                }
                else => break,
            }
        }
        debug!("control actor stopped");
    });

    (ControlHandle { tx }, task)
}

async fn handle_control(registry: &HandlerRegistry, control: Control) {
    match control {
        Control::RegisterHandler { key, entry } => {
            registry.insert(key, entry);
        }
        Control::UnregisterHandler { key } => {
            // Stop contract first, removal second.
            if let Some(entry) = registry.lookup(&key.domain, &key.namespace) {
                entry.handler.stop(&entry.options).await;
                registry.remove(&key);
            }
        }
    }
}
