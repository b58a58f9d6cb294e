//! Conversation and message types for Parley.
//!
//! A conversation is a durable, owned, append-only thread of messages.
//! `Conversation` is the stored record; `ConversationView` is the public
//! projection handed to callers (no internal id, no owner).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Identity of the principal that owns conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a conversation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'archived'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConversationStatus::Active),
            "archived" => Ok(ConversationStatus::Archived),
            other => Err(format!("invalid conversation status: '{other}'")),
        }
    }
}

/// A stored conversation.
///
/// `messages` is only populated by `get_conversation`; listings leave it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub uid: String,
    pub owner: UserId,
    pub title: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChatMessage>,
}

/// A single message within a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Filter for conversation lookups. Unset fields do not constrain the query.
#[derive(Debug, Clone, Default)]
pub struct ConversationFind {
    pub id: Option<Uuid>,
    pub uid: Option<String>,
    pub owner: Option<UserId>,
    pub status: Option<ConversationStatus>,
}

impl ConversationFind {
    /// Match a single conversation by its caller-visible handle.
    pub fn by_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    /// Restrict the filter to conversations owned by `owner`.
    pub fn owned_by(mut self, owner: &UserId) -> Self {
        self.owner = Some(owner.clone());
        self
    }

    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Update applied to a conversation. The store always bumps `updated_at`.
#[derive(Debug, Clone)]
pub struct ConversationUpdate {
    pub uid: String,
    pub title: Option<String>,
}

impl ConversationUpdate {
    /// An update that only bumps the last-update timestamp.
    pub fn touch(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            title: None,
        }
    }

    pub fn title(uid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            title: Some(title.into()),
        }
    }
}

/// Public projection of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationView {
    pub uid: String,
    pub title: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<MessageView>,
}

/// Public projection of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for MessageView {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            uid: conversation.uid.clone(),
            title: conversation.title.clone(),
            status: conversation.status,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            messages: conversation.messages.iter().map(MessageView::from).collect(),
        }
    }
}
