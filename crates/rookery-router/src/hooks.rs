//! Delivery-hook fallback for stanzas no more specific routing rule claims.
//!
//! The router hands these to the embedding server's hook chain via
//! [`crate::RouterState::run_delivery_hooks`]; [`bounce_unaddressed`] is the
//! default hook an embedding server registers at the end of that chain.

use jid::Jid;
use tracing::debug;

use crate::error::StanzaError;
use crate::router::route_error;
use crate::stanza::{MessageType, Stanza};
use crate::RouterState;

/// Events the router raises on the delivery-hook chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// A stanza addressed to the bare domain or to a resource of it that no
    /// routing rule claimed
    UnaddressedResourceDelivery,
}

impl HookEvent {
    /// Get the hook-chain event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnaddressedResourceDelivery => "delivery-to-unaddressed-resource",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a hook tells the chain to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Let later hooks in the chain see the stanza
    Continue,
    /// The stanza is dealt with; stop the chain
    Stop,
}

/// Decide the bounce outcome for a stanza that reached the fallback chain.
///
/// `None` means the stanza is silently accepted: presence addressed to an
/// empty resource, or a headline message addressed to an empty resource.
/// Everything else bounces as item-not-found.
pub fn bounce_error_for(to: &Jid, stanza: &Stanza) -> Option<StanzaError> {
    let bare = to.resource().is_none();
    match stanza {
        Stanza::Presence(_) if bare => None,
        Stanza::Message(m) if bare && m.type_ == MessageType::Headline => None,
        _ => Some(StanzaError::item_not_found(None)),
    }
}

/// Default delivery hook: silently accept the exempt stanzas, bounce the
/// rest back to the sender as item-not-found and stop the chain.
pub async fn bounce_unaddressed<S: RouterState>(
    state: &S,
    from: &Jid,
    to: &Jid,
    stanza: &Stanza,
) -> HookVerdict {
    match bounce_error_for(to, stanza) {
        None => {
            debug!(kind = %stanza.kind(), "silently accepting stanza to unaddressed resource");
            HookVerdict::Continue
        }
        Some(error) => {
            route_error(state, to, from, stanza, error).await;
            HookVerdict::Stop
        }
    }
}
