//! Error types for the local routing engine.

use thiserror::Error;

/// Internal routing faults.
///
/// These never escape [`crate::LocalRouter::route`]; they are caught at the
/// router boundary, logged, and swallowed so that one bad stanza cannot take
/// down the routing path.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The control actor has shut down and no longer accepts mutations
    #[error("control channel closed")]
    ControlUnavailable,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Protocol-level error descriptor attached to an error reply.
///
/// This is the structured form of a stanza error; serialization to the wire
/// is the transport layer's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaError {
    /// Error condition
    pub condition: StanzaErrorCondition,
    /// Error type
    pub error_type: StanzaErrorType,
    /// Optional human-readable text
    pub text: Option<String>,
}

impl StanzaError {
    /// Create a new stanza error.
    pub fn new(
        condition: StanzaErrorCondition,
        error_type: StanzaErrorType,
        text: Option<String>,
    ) -> Self {
        Self {
            condition,
            error_type,
            text,
        }
    }

    /// Create a stanza error for 'bad-request'.
    pub fn bad_request(text: Option<String>) -> Self {
        Self::new(
            StanzaErrorCondition::BadRequest,
            StanzaErrorType::Modify,
            text,
        )
    }

    /// Create a stanza error for 'feature-not-implemented'.
    pub fn feature_not_implemented(text: Option<String>) -> Self {
        Self::new(
            StanzaErrorCondition::FeatureNotImplemented,
            StanzaErrorType::Cancel,
            text,
        )
    }

    /// Create a stanza error for 'internal-server-error'.
    pub fn internal_server_error(text: Option<String>) -> Self {
        Self::new(
            StanzaErrorCondition::InternalServerError,
            StanzaErrorType::Wait,
            text,
        )
    }

    /// Create a stanza error for 'item-not-found'.
    pub fn item_not_found(text: Option<String>) -> Self {
        Self::new(
            StanzaErrorCondition::ItemNotFound,
            StanzaErrorType::Cancel,
            text,
        )
    }

    /// Create a stanza error for 'service-unavailable'.
    pub fn service_unavailable(text: Option<String>) -> Self {
        Self::new(
            StanzaErrorCondition::ServiceUnavailable,
            StanzaErrorType::Cancel,
            text,
        )
    }
}

impl std::fmt::Display for StanzaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} ({}): {}", self.condition, self.error_type, text),
            None => write!(f, "{} ({})", self.condition, self.error_type),
        }
    }
}

/// Stanza error conditions (RFC 6120 Section 8.3.3).
///
/// Trimmed to the conditions this crate emits plus the neighbors embedding
/// servers commonly reply with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaErrorCondition {
    /// Bad request (malformed query, wrong child count)
    BadRequest,
    /// Feature not implemented
    FeatureNotImplemented,
    /// Forbidden (permission denied)
    Forbidden,
    /// Internal server error
    InternalServerError,
    /// Item not found
    ItemNotFound,
    /// Not acceptable
    NotAcceptable,
    /// Recipient unavailable
    RecipientUnavailable,
    /// Remote server timeout
    RemoteServerTimeout,
    /// Service unavailable
    ServiceUnavailable,
    /// Undefined condition
    UndefinedCondition,
}

impl StanzaErrorCondition {
    /// Get the element name for this condition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::Forbidden => "forbidden",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::NotAcceptable => "not-acceptable",
            Self::RecipientUnavailable => "recipient-unavailable",
            Self::RemoteServerTimeout => "remote-server-timeout",
            Self::ServiceUnavailable => "service-unavailable",
            Self::UndefinedCondition => "undefined-condition",
        }
    }
}

impl std::fmt::Display for StanzaErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stanza error types (RFC 6120 Section 8.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaErrorType {
    /// Retry after providing credentials
    Auth,
    /// Do not retry (unrecoverable error)
    Cancel,
    /// Retry after changing the data sent
    Modify,
    /// Retry after waiting (temporary error)
    Wait,
}

impl StanzaErrorType {
    /// Get the type attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Cancel => "cancel",
            Self::Modify => "modify",
            Self::Wait => "wait",
        }
    }
}

impl std::fmt::Display for StanzaErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
