//! Unified error handling for roomcast.
//!
//! Every failure a client event can produce is a variant of [`HandlerError`],
//! so callers branch on kind instead of parsing text. The `Display` text is
//! the human-readable message carried by the `error` event; `error_code()`
//! provides the stable label used for metrics.

use crate::db::DbError;
use thiserror::Error;

/// Errors that can occur while handling a client event.
///
/// All variants are request-scoped: they are reported to the triggering
/// connection and never affect other connections' state.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The connection has no identity bound yet.
    #[error("register first")]
    NotRegistered,

    /// A register event with an empty username.
    #[error("username is required")]
    MissingUsername,

    /// Unknown room kind or malformed direct-room pair.
    #[error("{0}")]
    InvalidRoomRequest(String),

    /// A send_message event with empty content.
    #[error("content required")]
    EmptyContent,

    /// The connection never joined the room it is publishing to.
    #[error("join the room before sending")]
    NotAJoinedMember,

    /// The event frame was not a known JSON event.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The durable store rejected the operation. The operation aborts with
    /// nothing partially visible; it is not retried.
    #[error("message could not be stored")]
    Persistence(#[from] DbError),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::MissingUsername => "missing_username",
            Self::InvalidRoomRequest(_) => "invalid_room_request",
            Self::EmptyContent => "empty_content",
            Self::NotAJoinedMember => "not_a_joined_member",
            Self::Malformed(_) => "malformed_event",
            Self::Persistence(_) => "persistence_error",
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;
