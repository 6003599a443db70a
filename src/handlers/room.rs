//! Room membership: join, leave, and presence broadcast.

use super::Context;
use crate::error::{HandlerError, HandlerResult};
use crate::events::{RoomTarget, ServerEvent};
use crate::rooms;
use crate::state::SessionRegistry;
use std::sync::Arc;
use tracing::debug;

/// Join the resolved room and push updated presence to it.
pub fn join_room(ctx: &Context<'_>, target: &RoomTarget) -> HandlerResult {
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

    ctx.registry.join(ctx.conn_id, &key)?;
    debug!(conn = %ctx.conn_id, room = %key, "Joined room");

    ctx.registry
        .send_to_conn(ctx.conn_id, ServerEvent::RoomJoined { room: key.clone() });
    broadcast_presence(ctx.registry, &key);
    Ok(())
}

/// Leave the resolved room and push updated presence to it.
///
/// Leaving a room that was never joined is a no-op beyond the presence push.
pub fn leave_room(ctx: &Context<'_>, target: &RoomTarget) -> HandlerResult {
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

    ctx.registry.leave(ctx.conn_id, &key);
    debug!(conn = %ctx.conn_id, room = %key, "Left room");

    ctx.registry
        .send_to_conn(ctx.conn_id, ServerEvent::RoomLeft { room: key.clone() });
    broadcast_presence(ctx.registry, &key);
    Ok(())
}

/// Recompute a room's presence and push it to every member connection.
///
/// The member list is recomputed from the registry on every call; rooms
/// affected together (e.g. by a disconnect) each get their own push.
pub fn broadcast_presence(registry: &Arc<SessionRegistry>, room: &str) {
    let users = registry.members_of(room);
    registry.broadcast_to_room(room, &ServerEvent::RoomUsersUpdate { users });
}
