//! Connection lifecycle: identity registration and disconnect cleanup.

use super::Context;
use crate::error::HandlerResult;
use crate::events::ServerEvent;
use tracing::info;

/// Bind a username to the connection and acknowledge it.
///
/// Idempotent per connection: re-registration overwrites the binding.
pub fn register(ctx: &Context<'_>, username: &str) -> HandlerResult {
    ctx.registry.register(ctx.conn_id, username)?;
    info!(conn = %ctx.conn_id, username = %username, "Client registered");

    ctx.registry.send_to_conn(
        ctx.conn_id,
        ServerEvent::Registered {
            username: username.to_string(),
        },
    );
    Ok(())
}

/// Tear down a closed connection.
///
/// Atomically drops the identity binding and the membership set, then
/// recomputes and pushes presence for each vacated room independently.
pub fn disconnected(ctx: &Context<'_>) {
    let vacated = ctx.registry.disconnect(ctx.conn_id);
    for room in &vacated {
        super::broadcast_presence(ctx.registry, room);
    }
    ctx.registry.detach_sender(ctx.conn_id);

    if !vacated.is_empty() {
        info!(conn = %ctx.conn_id, rooms = vacated.len(), "Presence updated after disconnect");
    }
}
