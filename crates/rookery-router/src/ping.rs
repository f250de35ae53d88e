//! Built-in liveness query handler (XEP-0199 style ping).
//!
//! Answers `urn:xmpp:ping` gets with an empty result. Doubles as the
//! in-tree reference implementation of the [`IqHandler`] trait.

use async_trait::async_trait;
use jid::Jid;

use crate::error::StanzaError;
use crate::registry::IqHandler;
use crate::stanza::{Iq, IqType};

/// Namespace for the ping query.
pub const NS_PING: &str = "urn:xmpp:ping";

/// Check if an IQ is a well-formed ping request.
pub fn is_ping(iq: &Iq) -> bool {
    iq.type_ == IqType::Get
        && iq.payloads.len() == 1
        && iq.payloads[0].name() == "ping"
        && iq.payloads[0].ns() == NS_PING
}

/// Handler answering ping queries with an empty result.
#[derive(Debug, Default)]
pub struct PingHandler;

#[async_trait]
impl IqHandler for PingHandler {
    async fn handle_iq(&self, _from: &Jid, _to: &Jid, iq: Iq) -> Option<Iq> {
        if is_ping(&iq) {
            Some(iq.result_reply())
        } else {
            // A set, or a get carrying something other than <ping/>.
            Some(iq.error_reply(StanzaError::feature_not_implemented(None)))
        }
    }
}
