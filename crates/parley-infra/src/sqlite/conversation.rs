//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writer pool for
//! mutations and read-after-write, reader pool for plain lookups.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parley_core::chat::repository::ConversationRepository;
use parley_types::chat::{
    ChatMessage, Conversation, ConversationFind, ConversationStatus, ConversationUpdate,
    MessageRole, UserId,
};
use parley_types::error::RepositoryError;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    uid: String,
    owner_id: String,
    title: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            uid: row.try_get("uid")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        let status: ConversationStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Conversation {
            id,
            uid: self.uid,
            owner: UserId::new(self.owner_id),
            title: self.title,
            status,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            messages: Vec::new(),
        })
    }
}

struct ChatMessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id,
            conversation_id,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Current time at the precision the store keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width so that lexical order equals chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn is_unfiltered(find: &ConversationFind) -> bool {
    find.id.is_none() && find.uid.is_none() && find.owner.is_none() && find.status.is_none()
}

fn push_clause(builder: &mut QueryBuilder<'_, Sqlite>, started: &mut bool) {
    builder.push(if *started { " AND " } else { " WHERE " });
    *started = true;
}

/// Append ` WHERE ...` for every set field of `find`.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, find: &ConversationFind) {
    let mut started = false;

    if let Some(id) = find.id {
        push_clause(builder, &mut started);
        builder.push("id = ").push_bind(id.to_string());
    }
    if let Some(uid) = &find.uid {
        push_clause(builder, &mut started);
        builder.push("uid = ").push_bind(uid.clone());
    }
    if let Some(owner) = &find.owner {
        push_clause(builder, &mut started);
        builder.push("owner_id = ").push_bind(owner.as_str().to_string());
    }
    if let Some(status) = find.status {
        push_clause(builder, &mut started);
        builder.push("status = ").push_bind(status.to_string());
    }
}

fn select_conversations(find: &ConversationFind) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(
        "SELECT id, uid, owner_id, title, status, created_at, updated_at FROM conversations",
    );
    push_filter(&mut builder, find);
    builder.push(" ORDER BY updated_at DESC, rowid DESC");
    builder
}

impl SqliteConversationRepository {
    async fn fetch_by_uid_from_writer(&self, uid: &str) -> Result<Conversation, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, uid, owner_id, title, status, created_at, updated_at FROM conversations WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(query_error)?
        .ok_or(RepositoryError::NotFound)?;

        ConversationRow::from_row(&row)
            .map_err(query_error)?
            .into_conversation()
    }
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(
        &self,
        owner: &UserId,
        title: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, RepositoryError> {
        let now = now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            uid: Uuid::now_v7().to_string(),
            owner: owner.clone(),
            title: title.to_string(),
            status,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };

        sqlx::query(
            r#"INSERT INTO conversations (id, uid, owner_id, title, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.uid)
        .bind(owner.as_str())
        .bind(&conversation.title)
        .bind(status.to_string())
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => query_error(e),
        })?;

        Ok(conversation)
    }

    async fn find_conversations(
        &self,
        find: &ConversationFind,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = select_conversations(find)
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row).map_err(query_error)?;
            conversations.push(conversation_row.into_conversation()?);
        }
        Ok(conversations)
    }

    async fn get_conversation(
        &self,
        find: &ConversationFind,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let mut builder = select_conversations(find);
        builder.push(" LIMIT 1");
        let row = builder
            .build()
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut conversation = ConversationRow::from_row(&row)
            .map_err(query_error)?
            .into_conversation()?;
        conversation.messages = self.list_messages(&conversation.id).await?;
        Ok(Some(conversation))
    }

    async fn update_conversation(
        &self,
        update: &ConversationUpdate,
    ) -> Result<Conversation, RepositoryError> {
        let now = format_datetime(&now());
        let result = match &update.title {
            Some(title) => {
                sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE uid = ?")
                    .bind(title)
                    .bind(&now)
                    .bind(&update.uid)
                    .execute(&self.pool.writer)
                    .await
            }
            None => {
                sqlx::query("UPDATE conversations SET updated_at = ? WHERE uid = ?")
                    .bind(&now)
                    .bind(&update.uid)
                    .execute(&self.pool.writer)
                    .await
            }
        }
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.fetch_by_uid_from_writer(&update.uid).await
    }

    async fn delete_conversation(&self, find: &ConversationFind) -> Result<(), RepositoryError> {
        if is_unfiltered(find) {
            return Err(RepositoryError::Query(
                "refusing to delete conversations without a filter".to_string(),
            ));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM conversations");
        push_filter(&mut builder, find);
        builder
            .build()
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = ChatMessage {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            role,
            content: content.to_string(),
            created_at: now(),
        };

        sqlx::query(
            r#"INSERT INTO chat_messages (id, conversation_id, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(conversation_id.to_string())
        .bind(role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
            _ => query_error(e),
        })?;

        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at FROM chat_messages WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row = ChatMessageRow::from_row(row).map_err(query_error)?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }
}
