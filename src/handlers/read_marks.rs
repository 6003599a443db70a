//! Conversation read receipts.

use super::Context;
use crate::error::{HandlerError, HandlerResult};
use crate::events::{RoomTarget, ServerEvent};
use crate::rooms;
use tracing::debug;

/// Handle a mark_read event.
///
/// Direct rooms: flip unread messages addressed to the requester and
/// broadcast the receipt to the room. Group rooms have no single-reader
/// read state; the requester just gets a zero-count receipt back.
pub async fn mark_read(ctx: &Context<'_>, target: &RoomTarget) -> HandlerResult {
    let username = ctx
        .registry
        .identity(ctx.conn_id)
        .ok_or(HandlerError::NotRegistered)?;

    let key = rooms::room_key(
        &target.room_type,
        target.room_name.as_deref(),
        Some(&username),
        target.target.as_deref(),
    )?;

    if target.room_type == rooms::KIND_DM {
        let count = ctx.db.messages().mark_direct_read(&key, &username).await?;
        debug!(room = %key, user = %username, count, "Read receipt");
        ctx.registry.broadcast_to_room(
            &key,
            &ServerEvent::ReadReceipt {
                room: key.clone(),
                count,
            },
        );
    } else {
        ctx.registry
            .send_to_conn(ctx.conn_id, ServerEvent::ReadReceipt { room: key, count: 0 });
    }

    Ok(())
}
