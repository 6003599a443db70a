//! The send pipeline: validate, persist, broadcast, notify.

use super::Context;
use crate::db::{MentionNotice, NewMessage};
use crate::error::{HandlerError, HandlerResult};
use crate::events::{MessageBroadcast, RoomTarget, ServerEvent};
use crate::rooms;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("mention pattern compiles"));

/// Extract `@`-mentioned usernames from message content, one entry per
/// occurrence.
///
/// Mentions are literal tokens and are deliberately *not* validated against
/// live or known usernames: a mention of an offline or unknown user still
/// produces stored Mention and Notification rows, with no live delivery.
pub fn extract_mentions(content: &str) -> Vec<String> {
    MENTION_PATTERN
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

fn mention_title(sender: &str, target: &RoomTarget) -> String {
    if target.room_type == rooms::KIND_DM {
        format!("You were mentioned by {sender} in direct message")
    } else {
        let name = target
            .room_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(rooms::DEFAULT_GROUP);
        format!("You were mentioned by {sender} in group: {name}")
    }
}

/// Handle a send_message event.
///
/// The message, its mention rows, and their notification rows commit in one
/// transaction before anything is broadcast: a client never observes a
/// broadcast for a message that failed to persist.
pub async fn send_message(ctx: &Context<'_>, target: &RoomTarget, content: &str) -> HandlerResult {
    let username = ctx
        .registry
        .identity(ctx.conn_id)
        .ok_or(HandlerError::NotRegistered)?;

    if content.is_empty() {
        return Err(HandlerError::EmptyContent);
    }

    let key = rooms::room_key(
        &target.room_type,
        target.room_name.as_deref(),
        Some(&username),
        target.target.as_deref(),
    )?;

    // A connection must explicitly join before it may publish.
    if !ctx.registry.is_member(ctx.conn_id, &key) {
        return Err(HandlerError::NotAJoinedMember);
    }

    let recipient = if target.room_type == rooms::KIND_DM {
        target.target.as_deref()
    } else {
        None
    };

    let mentions = extract_mentions(content);
    let notices: Vec<MentionNotice<'_>> = mentions
        .iter()
        .map(|user| MentionNotice {
            user,
            title: mention_title(&username, target),
        })
        .collect();

    let stored = ctx
        .db
        .messages()
        .store(
            NewMessage {
                room: &key,
                sender: &username,
                recipient,
                content,
            },
            &notices,
        )
        .await?;

    crate::metrics::record_message_sent();
    crate::metrics::record_notifications(notices.len());
    info!(
        room = %key,
        sender = %username,
        mentions = mentions.len(),
        "Message stored"
    );

    let fanout = ctx.registry.broadcast_to_room(
        &key,
        &ServerEvent::Message(MessageBroadcast {
            id: stored.id,
            room: key.clone(),
            sender: username.clone(),
            recipient: recipient.map(String::from),
            content: content.to_string(),
            created_at: stored.created_at.clone(),
            is_read: false,
            mentions: mentions.clone(),
        }),
    );
    crate::metrics::record_fanout(fanout);

    // One alert per mention occurrence, to every live session of that user.
    // A mentioned user with no session gets the stored rows only.
    for mentioned in &mentions {
        let unread = ctx.db.notifications().unread_count(mentioned).await?;

        ctx.registry.push_to_user(
            mentioned,
            &ServerEvent::MentionNotification {
                message_id: stored.id,
                sender: username.clone(),
                content: content.to_string(),
                room: key.clone(),
                created_at: stored.created_at.clone(),
            },
        );
        ctx.registry.push_to_user(
            mentioned,
            &ServerEvent::NotificationUpdate {
                update_type: "new_notification",
                count: unread,
            },
        );
    }

    Ok(())
}
