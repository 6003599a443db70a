//! Client event handlers.
//!
//! Inbound frames are parsed into [`ClientEvent`] and dispatched to the
//! handler for that event. Handlers receive a [`Context`] carrying the
//! connection identity, the shared session registry, and the durable store.

mod connection;
mod messaging;
mod read_marks;
mod room;

pub use connection::{disconnected, register};
pub use messaging::{extract_mentions, send_message};
pub use read_marks::mark_read;
pub use room::{broadcast_presence, join_room, leave_room};

use crate::db::Database;
use crate::error::{HandlerError, HandlerResult};
use crate::events::ClientEvent;
use crate::state::{ConnId, SessionRegistry};
use std::sync::Arc;
use tracing::debug;

/// Handler context passed to each event handler.
pub struct Context<'a> {
    /// The connection this event arrived on.
    pub conn_id: ConnId,
    /// Shared live-session state.
    pub registry: &'a Arc<SessionRegistry>,
    /// Durable store.
    pub db: &'a Database,
}

/// Parse a raw text frame and dispatch it.
pub async fn dispatch_raw(ctx: &Context<'_>, raw: &str) -> HandlerResult {
    let event: ClientEvent = serde_json::from_str(raw).map_err(|e| {
        crate::metrics::record_event_error("unknown", "malformed_event");
        HandlerError::Malformed(e)
    })?;
    dispatch(ctx, event).await
}

/// Dispatch a parsed client event to its handler.
pub async fn dispatch(ctx: &Context<'_>, event: ClientEvent) -> HandlerResult {
    let name = event.name();
    crate::metrics::record_event(name);

    let result = match event {
        ClientEvent::Register { username } => register(ctx, &username),
        ClientEvent::JoinRoom { room } => join_room(ctx, &room),
        ClientEvent::LeaveRoom { room } => leave_room(ctx, &room),
        ClientEvent::SendMessage { room, content } => send_message(ctx, &room, &content).await,
        ClientEvent::MarkRead { room } => mark_read(ctx, &room).await,
    };

    if let Err(e) = &result {
        crate::metrics::record_event_error(name, e.error_code());
        debug!(event = name, error = %e, "Event rejected");
    }
    result
}
