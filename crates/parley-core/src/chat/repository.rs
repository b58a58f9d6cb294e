//! ConversationRepository trait definition.
//!
//! Provides CRUD operations for conversations and their messages.

use parley_types::chat::{
    ChatMessage, Conversation, ConversationFind, ConversationStatus, ConversationUpdate,
    MessageRole, UserId,
};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    /// Create a new conversation owned by `owner`.
    fn create_conversation(
        &self,
        owner: &UserId,
        title: &str,
        status: ConversationStatus,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Conversations matching `find`, most recently updated first. Messages are not loaded.
    fn find_conversations(
        &self,
        find: &ConversationFind,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// The first conversation matching `find`, with its messages loaded.
    fn get_conversation(
        &self,
        find: &ConversationFind,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Apply `update` and bump `updated_at`. Returns `NotFound` for an unknown uid.
    fn update_conversation(
        &self,
        update: &ConversationUpdate,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Delete matching conversations and their messages.
    fn delete_conversation(
        &self,
        find: &ConversationFind,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a message to a conversation.
    fn create_message(
        &self,
        conversation_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Messages of a conversation, ordered by created_at ASC.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
