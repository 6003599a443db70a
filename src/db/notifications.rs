//! Notification repository.
//!
//! Per-user mention notifications with read/unread state. Rows are created
//! inside the message store transaction; this repository owns the read side:
//! listing, unread counts, and mark-read.

use super::DbError;
use serde::Serialize;
use sqlx::SqlitePool;

/// A notification row as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    pub room: Option<String>,
    pub sender: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

type NotificationRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    String,
);

/// Repository for notification operations.
pub struct NotificationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// A user's notifications, newest first.
    pub async fn list_for_user(
        &self,
        user: &str,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>, DbError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, kind, title, content, room, sender, is_read, created_at
            FROM notifications
            WHERE user = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, kind, title, content, room, sender, is_read, created_at)| {
                    NotificationRecord {
                        id,
                        kind,
                        title,
                        content,
                        room,
                        sender,
                        is_read,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// Live count of a user's unread notifications.
    pub async fn unread_count(&self, user: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user = ? AND is_read = 0",
        )
        .bind(user)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Flip unread notifications owned by `user` to read.
    ///
    /// With a non-empty id list only those rows are touched; ids owned by
    /// other users are ignored. An absent or empty list marks everything.
    /// Returns the number of rows updated.
    pub async fn mark_read(&self, user: &str, ids: Option<&[i64]>) -> Result<u64, DbError> {
        let result = match ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "UPDATE notifications SET is_read = 1 \
                     WHERE user = ? AND is_read = 0 AND id IN ({placeholders})"
                );
                let mut query = sqlx::query(&sql).bind(user);
                for id in ids {
                    query = query.bind(*id);
                }
                query.execute(self.pool).await?
            }
            _ => {
                sqlx::query("UPDATE notifications SET is_read = 1 WHERE user = ? AND is_read = 0")
                    .bind(user)
                    .execute(self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MentionNotice, NewMessage};

    async fn seed(db: &Database, sender: &str, user: &str, content: &str) {
        db.messages()
            .store(
                NewMessage {
                    room: "group:lobby",
                    sender,
                    recipient: None,
                    content,
                },
                &[MentionNotice {
                    user,
                    title: format!("You were mentioned by {sender} in group: lobby"),
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_is_newest_first_and_capped() {
        let db = Database::new(":memory:").await.unwrap();
        for i in 0..4 {
            seed(&db, "alice", "bob", &format!("@bob ping {i}")).await;
        }

        let rows = db.notifications().list_for_user("bob", 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].content, "@bob ping 3");
        assert_eq!(rows[0].kind, "mention");
        assert!(rows[0].created_at >= rows[2].created_at);
    }

    #[tokio::test]
    async fn mark_read_ignores_foreign_ids() {
        let db = Database::new(":memory:").await.unwrap();
        seed(&db, "alice", "bob", "@bob one").await;
        seed(&db, "alice", "carol", "@carol two").await;

        let carols = db.notifications().list_for_user("carol", 50).await.unwrap();
        let carol_id = carols[0].id;

        // bob cannot flip carol's row
        let updated = db
            .notifications()
            .mark_read("bob", Some(&[carol_id]))
            .await
            .unwrap();
        assert_eq!(updated, 0);
        assert_eq!(db.notifications().unread_count("carol").await.unwrap(), 1);

        let bobs = db.notifications().list_for_user("bob", 50).await.unwrap();
        let updated = db
            .notifications()
            .mark_read("bob", Some(&[bobs[0].id]))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(db.notifications().unread_count("bob").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_id_list_marks_everything() {
        let db = Database::new(":memory:").await.unwrap();
        seed(&db, "alice", "bob", "@bob one").await;
        seed(&db, "alice", "bob", "@bob two").await;

        let updated = db.notifications().mark_read("bob", Some(&[])).await.unwrap();
        assert_eq!(updated, 2);
        assert_eq!(db.notifications().unread_count("bob").await.unwrap(), 0);

        // no-op when nothing is unread
        assert_eq!(db.notifications().mark_read("bob", None).await.unwrap(), 0);
    }
}
