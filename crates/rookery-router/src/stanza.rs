//! Stanza model for the local routing engine.
//!
//! Wire-level parsing and serialization live outside this crate; routing
//! operates on these structured stanzas, with payload children carried as
//! [`minidom::Element`] values. The addressing envelope (sender/recipient
//! [`jid::Jid`]) is passed alongside the stanza rather than stored in it.

use minidom::Element;
use serde::{Deserialize, Serialize};

use crate::error::StanzaError;

/// IQ type attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IqType {
    /// Request for information
    Get,
    /// Request to change state
    Set,
    /// Successful reply to a get/set
    Result,
    /// Error reply to a get/set
    Error,
}

impl IqType {
    /// Get the type attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for IqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message type attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// One-to-one chat
    Chat,
    /// Error reply
    Error,
    /// Group chat
    Groupchat,
    /// Broadcast-style notification, never stored offline
    Headline,
    /// Default message type
    Normal,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Error => write!(f, "error"),
            Self::Groupchat => write!(f, "groupchat"),
            Self::Headline => write!(f, "headline"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Presence type attribute. `Available` is the absence of a type attribute
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceType {
    /// Available (no type attribute)
    Available,
    /// Unavailable
    Unavailable,
    /// Subscription request
    Subscribe,
    /// Subscription approval
    Subscribed,
    /// Unsubscribe request
    Unsubscribe,
    /// Subscription cancellation
    Unsubscribed,
    /// Presence probe
    Probe,
    /// Error reply
    Error,
}

/// IQ (info/query) stanza: one half of a request/response exchange,
/// correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Iq {
    /// Correlation identifier
    pub id: String,
    /// IQ type
    pub type_: IqType,
    /// Structured child payload elements
    pub payloads: Vec<Element>,
    /// Language tag (xml:lang) of the original stanza
    pub lang: Option<String>,
    /// Error descriptor, present on error-typed stanzas
    pub error: Option<StanzaError>,
}

impl Iq {
    /// Create a `get` query carrying one payload element.
    pub fn get(id: impl Into<String>, payload: Element) -> Self {
        Self {
            id: id.into(),
            type_: IqType::Get,
            payloads: vec![payload],
            lang: None,
            error: None,
        }
    }

    /// Create a `set` query carrying one payload element.
    pub fn set(id: impl Into<String>, payload: Element) -> Self {
        Self {
            id: id.into(),
            type_: IqType::Set,
            payloads: vec![payload],
            lang: None,
            error: None,
        }
    }

    /// Create an empty `result` reply with the given id.
    pub fn result(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: IqType::Result,
            payloads: Vec::new(),
            lang: None,
            error: None,
        }
    }

    /// Set the language tag.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Whether this IQ is a query (`get` or `set`).
    pub fn is_request(&self) -> bool {
        matches!(self.type_, IqType::Get | IqType::Set)
    }

    /// Whether this IQ is a reply (`result` or `error`).
    pub fn is_reply(&self) -> bool {
        matches!(self.type_, IqType::Result | IqType::Error)
    }

    /// Build an empty `result` reply to this query, reusing its id and
    /// language tag.
    pub fn result_reply(&self) -> Iq {
        Iq {
            id: self.id.clone(),
            type_: IqType::Result,
            payloads: Vec::new(),
            lang: self.lang.clone(),
            error: None,
        }
    }

    /// Build an `error` reply to this query: same id and payloads, the
    /// original language tag preserved for localization.
    pub fn error_reply(&self, error: StanzaError) -> Iq {
        Iq {
            id: self.id.clone(),
            type_: IqType::Error,
            payloads: self.payloads.clone(),
            lang: self.lang.clone(),
            error: Some(error),
        }
    }
}

/// Message stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Stanza identifier
    pub id: Option<String>,
    /// Message type
    pub type_: MessageType,
    /// Structured child payload elements
    pub payloads: Vec<Element>,
    /// Language tag (xml:lang)
    pub lang: Option<String>,
    /// Error descriptor, present on error-typed stanzas
    pub error: Option<StanzaError>,
}

impl Message {
    /// Create a message of the given type with no payloads.
    pub fn new(type_: MessageType) -> Self {
        Self {
            id: None,
            type_,
            payloads: Vec::new(),
            lang: None,
            error: None,
        }
    }

    /// Build an `error` reply to this message, preserving payloads and
    /// language tag.
    pub fn error_reply(&self, error: StanzaError) -> Message {
        Message {
            id: self.id.clone(),
            type_: MessageType::Error,
            payloads: self.payloads.clone(),
            lang: self.lang.clone(),
            error: Some(error),
        }
    }
}

/// Presence stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    /// Stanza identifier
    pub id: Option<String>,
    /// Presence type
    pub type_: PresenceType,
    /// Structured child payload elements
    pub payloads: Vec<Element>,
    /// Language tag (xml:lang)
    pub lang: Option<String>,
    /// Error descriptor, present on error-typed stanzas
    pub error: Option<StanzaError>,
}

impl Presence {
    /// Create a presence of the given type with no payloads.
    pub fn new(type_: PresenceType) -> Self {
        Self {
            id: None,
            type_,
            payloads: Vec::new(),
            lang: None,
            error: None,
        }
    }

    /// Build an `error` reply to this presence, preserving payloads and
    /// language tag.
    pub fn error_reply(&self, error: StanzaError) -> Presence {
        Presence {
            id: self.id.clone(),
            type_: PresenceType::Error,
            payloads: self.payloads.clone(),
            lang: self.lang.clone(),
            error: Some(error),
        }
    }
}

/// A routable stanza.
#[derive(Debug, Clone, PartialEq)]
pub enum Stanza {
    /// IQ stanza
    Iq(Iq),
    /// Message stanza
    Message(Message),
    /// Presence stanza
    Presence(Presence),
}

impl Stanza {
    /// Stanza kind for logging and metrics.
    pub fn kind(&self) -> StanzaKind {
        match self {
            Self::Iq(_) => StanzaKind::Iq,
            Self::Message(_) => StanzaKind::Message,
            Self::Presence(_) => StanzaKind::Presence,
        }
    }

    /// Whether this stanza is itself error-typed. Error-typed stanzas are
    /// never answered with another error.
    pub fn is_error(&self) -> bool {
        match self {
            Self::Iq(iq) => iq.type_ == IqType::Error,
            Self::Message(m) => m.type_ == MessageType::Error,
            Self::Presence(p) => p.type_ == PresenceType::Error,
        }
    }

    /// Language tag of the stanza, if any.
    pub fn lang(&self) -> Option<&str> {
        match self {
            Self::Iq(iq) => iq.lang.as_deref(),
            Self::Message(m) => m.lang.as_deref(),
            Self::Presence(p) => p.lang.as_deref(),
        }
    }

    /// Build an error reply of the same stanza kind, preserving the
    /// original's payloads and language tag.
    pub fn error_reply(&self, error: StanzaError) -> Stanza {
        match self {
            Self::Iq(iq) => Stanza::Iq(iq.error_reply(error)),
            Self::Message(m) => Stanza::Message(m.error_reply(error)),
            Self::Presence(p) => Stanza::Presence(p.error_reply(error)),
        }
    }
}

/// Stanza kind for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    /// IQ (info/query) stanza
    Iq,
    /// Message stanza
    Message,
    /// Presence stanza
    Presence,
}

impl std::fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iq => write!(f, "iq"),
            Self::Message => write!(f, "message"),
            Self::Presence => write!(f, "presence"),
        }
    }
}
