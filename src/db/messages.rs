//! Message repository.
//!
//! Handles the transactional write path of the send pipeline (message row +
//! mention rows + notification rows commit together, or not at all), room
//! history queries, and direct-room read flips.

use super::{DbError, now_stamp};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// A message about to be persisted.
pub struct NewMessage<'a> {
    pub room: &'a str,
    pub sender: &'a str,
    /// The direct-room counterparty; absent for group rooms.
    pub recipient: Option<&'a str>,
    pub content: &'a str,
}

/// One mention occurrence and the notification it generates.
pub struct MentionNotice<'a> {
    pub user: &'a str,
    pub title: String,
}

/// Row identity handed back after a successful store.
pub struct StoredMessage {
    pub id: i64,
    pub created_at: String,
}

/// A message row as served by the history API.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub room: String,
    pub sender: String,
    pub recipient: Option<String>,
    pub content: String,
    pub created_at: String,
    pub is_read: bool,
    pub mentions: Vec<String>,
}

type MessageRow = (i64, String, String, Option<String>, String, String, bool);

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message together with its mention and notification rows.
    ///
    /// One mention row and one notification row per occurrence, in a single
    /// transaction: a crash mid-send never leaves a message visible without
    /// its mentions. Notification reads live in the notification repository.
    pub async fn store(
        &self,
        msg: NewMessage<'_>,
        notices: &[MentionNotice<'_>],
    ) -> Result<StoredMessage, DbError> {
        let created_at = now_stamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO messages (room, sender, recipient, content, created_at, is_read)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(msg.room)
        .bind(msg.sender)
        .bind(msg.recipient)
        .bind(msg.content)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        let message_id = result.last_insert_rowid();

        for notice in notices {
            sqlx::query(
                r#"
                INSERT INTO mentions (message_id, mentioned_user, created_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(message_id)
            .bind(notice.user)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO notifications (user, kind, title, content, room, sender, is_read, created_at)
                VALUES (?, 'mention', ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(notice.user)
            .bind(&notice.title)
            .bind(msg.content)
            .bind(msg.room)
            .bind(msg.sender)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(StoredMessage {
            id: message_id,
            created_at,
        })
    }

    /// Room history, oldest first, with each row's mentioned-user list.
    pub async fn list_for_room(
        &self,
        room: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, room, sender, recipient, content, created_at, is_read
            FROM messages
            WHERE room = ?
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(room)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let mention_rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT m.message_id, m.mentioned_user
            FROM mentions m
            JOIN messages s ON s.id = m.message_id
            WHERE s.room = ?
            ORDER BY m.id ASC
            "#,
        )
        .bind(room)
        .fetch_all(self.pool)
        .await?;

        let mut mentions_by_message: HashMap<i64, Vec<String>> = HashMap::new();
        for (message_id, user) in mention_rows {
            mentions_by_message.entry(message_id).or_default().push(user);
        }

        Ok(rows
            .into_iter()
            .map(
                |(id, room, sender, recipient, content, created_at, is_read)| MessageRecord {
                    id,
                    room,
                    sender,
                    recipient,
                    content,
                    created_at,
                    is_read,
                    mentions: mentions_by_message.remove(&id).unwrap_or_default(),
                },
            )
            .collect())
    }

    /// Flip unread direct-room messages addressed to `recipient` to read.
    ///
    /// Returns the number of rows updated. Group rooms have no single-reader
    /// read state, so callers never route them here.
    pub async fn mark_direct_read(&self, room: &str, recipient: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = 1
            WHERE room = ? AND recipient = ? AND is_read = 0
            "#,
        )
        .bind(room)
        .bind(recipient)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
