//! Conversation management service.
//!
//! `ConversationService` exposes the caller-scoped operations on stored
//! conversations: listing, reading, renaming and deleting. Generation itself
//! lives in `crate::generation`.

use std::sync::Arc;

use parley_types::chat::{
    Conversation, ConversationFind, ConversationStatus, ConversationUpdate, UserId,
};
use parley_types::error::ChatError;
use tracing::info;

use crate::chat::repository::ConversationRepository;

/// Caller-scoped conversation management.
///
/// Generic over `ConversationRepository` to maintain clean architecture
/// (parley-core never depends on parley-infra).
pub struct ConversationService<R> {
    repo: Arc<R>,
}

impl<R> Clone for ConversationService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

fn require_caller(caller: Option<&UserId>) -> Result<&UserId, ChatError> {
    caller.ok_or_else(|| ChatError::PermissionDenied("permission denied".to_string()))
}

fn internal(action: &str, err: impl std::fmt::Display) -> ChatError {
    ChatError::Internal(format!("failed to {action}: {err}"))
}

impl<R: ConversationRepository> ConversationService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Active conversations of the caller, most recently updated first.
    pub async fn list_conversations(
        &self,
        caller: Option<&UserId>,
    ) -> Result<Vec<Conversation>, ChatError> {
        let owner = caller
            .ok_or_else(|| ChatError::Unauthenticated("user not authenticated".to_string()))?;
        let find = ConversationFind {
            owner: Some(owner.clone()),
            status: Some(ConversationStatus::Active),
            ..ConversationFind::default()
        };
        self.repo
            .find_conversations(&find)
            .await
            .map_err(|e| internal("list conversations", e))
    }

    /// A conversation of the caller with its messages.
    pub async fn get_conversation(
        &self,
        caller: Option<&UserId>,
        uid: &str,
    ) -> Result<Conversation, ChatError> {
        let owner = require_caller(caller)?;
        self.owned(owner, uid).await
    }

    /// Replace the title of a conversation of the caller.
    pub async fn rename_conversation(
        &self,
        caller: Option<&UserId>,
        uid: &str,
        title: &str,
    ) -> Result<Conversation, ChatError> {
        let owner = require_caller(caller)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::InvalidArgument(
                "title cannot be empty".to_string(),
            ));
        }
        self.owned(owner, uid).await?;

        let updated = self
            .repo
            .update_conversation(&ConversationUpdate::title(uid, title))
            .await
            .map_err(|e| internal("update conversation", e))?;
        info!(conversation_uid = %uid, title = %title, "Renamed conversation");
        Ok(updated)
    }

    /// Delete a conversation of the caller and its messages.
    pub async fn delete_conversation(
        &self,
        caller: Option<&UserId>,
        uid: &str,
    ) -> Result<(), ChatError> {
        let owner = require_caller(caller)?;
        self.owned(owner, uid).await?;

        self.repo
            .delete_conversation(&ConversationFind::by_uid(uid))
            .await
            .map_err(|e| internal("delete conversation", e))?;
        info!(conversation_uid = %uid, "Deleted conversation");
        Ok(())
    }

    /// Load `uid`, distinguishing "absent" from "owned by someone else".
    async fn owned(&self, owner: &UserId, uid: &str) -> Result<Conversation, ChatError> {
        let conversation = self
            .repo
            .get_conversation(&ConversationFind::by_uid(uid))
            .await
            .map_err(|e| internal("get conversation", e))?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {uid} not found")))?;

        if &conversation.owner != owner {
            return Err(ChatError::PermissionDenied("permission denied".to_string()));
        }
        Ok(conversation)
    }
}
