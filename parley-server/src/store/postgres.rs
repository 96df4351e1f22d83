use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use shared::models::{Attachment, AttachmentKind, ConversationSummary, Message, Timestamp};

use super::{ConversationStore, NewMessage, StoreError};

/// Postgres-backed message store. One flat `parley.messages` table; the
/// conversation list is derived per request rather than maintained as state.
#[derive(Debug, Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Database(other),
    }
}

fn message_from_row(row: &PgRow) -> Result<Message, sqlx::Error> {
    let attachment = match row.try_get::<Option<String>, _>("attachment_url")? {
        Some(url) => {
            let kind: String = row.try_get("attachment_kind")?;
            let kind = match kind.as_str() {
                "image" => AttachmentKind::Image,
                _ => AttachmentKind::File,
            };
            Some(Attachment {
                url,
                kind,
                name: row.try_get("attachment_name")?,
            })
        }
        None => None,
    };

    Ok(Message {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        content: row.try_get("content")?,
        attachment,
        sent_at: Timestamp(row.try_get::<DateTime<Utc>, _>("sent_at")?),
        edited: row.try_get("edited")?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, attachment_url, attachment_kind, attachment_name, \
     sent_at, edited";

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        let (url, kind, name) = match &new.attachment {
            Some(attachment) => (
                Some(attachment.url.clone()),
                Some(attachment.kind.to_string()),
                Some(attachment.name.clone()),
            ),
            None => (None, None, None),
        };

        let sql = format!(
            "INSERT INTO parley.messages \
             (id, sender_id, receiver_id, content, attachment_url, attachment_kind, attachment_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {MESSAGE_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.sender_id)
            .bind(new.receiver_id)
            .bind(&new.content)
            .bind(url)
            .bind(kind)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_store_error)?;

        message_from_row(&row).map_err(StoreError::Database)
    }

    async fn messages_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM parley.messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY sent_at ASC, id ASC"
        );

        let rows = sqlx::query(&sql)
            .bind(a)
            .bind(b)
            .fetch_all(&self.pool)
            .await
            .map_err(map_store_error)?;

        rows.iter()
            .map(|row| message_from_row(row).map_err(StoreError::Database))
            .collect()
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM parley.messages WHERE id = $1");

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_store_error)?;

        row.as_ref()
            .map(message_from_row)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn update_message_content(&self, id: Uuid, content: &str) -> Result<Message, StoreError> {
        let sql = format!(
            "UPDATE parley.messages SET content = $2, edited = TRUE \
             WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_store_error)?;

        match row {
            Some(row) => message_from_row(&row).map_err(StoreError::Database),
            None => Err(StoreError::NotFound(format!("message {id}"))),
        }
    }

    async fn delete_message(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM parley.messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("message {id}")));
        }
        Ok(())
    }

    async fn delete_conversation(&self, a: Uuid, b: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM parley.messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(a)
        .bind(b)
        .execute(&self.pool)
        .await
        .map_err(map_store_error)?;

        Ok(result.rows_affected())
    }

    async fn conversation_summaries(
        &self,
        identity: Uuid,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT counterpart_id, content, attachment_name, sent_at FROM ( \
                 SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS counterpart_id, \
                        content, attachment_name, sent_at, \
                        ROW_NUMBER() OVER ( \
                            PARTITION BY CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END \
                            ORDER BY sent_at DESC, id DESC \
                        ) AS rank \
                 FROM parley.messages \
                 WHERE sender_id = $1 OR receiver_id = $1 \
             ) ranked WHERE rank = 1 ORDER BY sent_at DESC",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_error)?;

        rows.iter()
            .map(|row| {
                let content: Option<String> = row.try_get("content")?;
                let attachment_name: Option<String> = row.try_get("attachment_name")?;
                Ok(ConversationSummary {
                    counterpart_id: row.try_get("counterpart_id")?,
                    last_message_preview: content
                        .or(attachment_name)
                        .unwrap_or_default(),
                    last_activity_at: Timestamp(row.try_get::<DateTime<Utc>, _>("sent_at")?),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::Database)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }
}
