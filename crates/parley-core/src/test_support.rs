//! In-memory doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use parley_types::chat::{
    ChatMessage, Conversation, ConversationFind, ConversationStatus, ConversationUpdate,
    MessageRole, UserId,
};
use parley_types::config::{AiSettings, ResolvedAiSettings};
use parley_types::error::RepositoryError;
use parley_types::event::GenerationEvent;
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, StreamEvent, Usage,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::repository::ConversationRepository;
use crate::generation::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::{LlmProvider, ProviderStream};

// --- Repository ---

#[derive(Default)]
struct RepoState {
    conversations: Vec<Conversation>,
    messages: Vec<ChatMessage>,
    ticks: i64,
}

/// Which repository operations should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub create_conversation: bool,
    pub get_conversation: bool,
    pub update_conversation: bool,
    pub create_message: bool,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
    failures: Mutex<Failures>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: Failures) -> Self {
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }

    pub fn set_failures(&self, failures: Failures) {
        *self.failures.lock().unwrap() = failures;
    }

    fn failures(&self) -> Failures {
        *self.failures.lock().unwrap()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().unwrap().conversations.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Insert a conversation directly, bypassing failure injection.
    pub fn seed(&self, owner: &UserId, title: &str) -> Conversation {
        let mut state = self.state.lock().unwrap();
        let now = next_instant(&mut state);
        let conversation = Conversation {
            id: Uuid::now_v7(),
            uid: Uuid::now_v7().to_string(),
            owner: owner.clone(),
            title: title.to_string(),
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        state.conversations.push(conversation.clone());
        conversation
    }
}

/// Strictly increasing timestamps so ordering assertions are deterministic.
fn next_instant(state: &mut RepoState) -> chrono::DateTime<Utc> {
    state.ticks += 1;
    chrono::DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_700_000_000 + state.ticks)
}

fn matches_find(conversation: &Conversation, find: &ConversationFind) -> bool {
    find.id.is_none_or(|id| conversation.id == id)
        && find.uid.as_ref().is_none_or(|uid| &conversation.uid == uid)
        && find.owner.as_ref().is_none_or(|owner| &conversation.owner == owner)
        && find.status.is_none_or(|status| conversation.status == status)
}

fn injected(operation: &str) -> RepositoryError {
    RepositoryError::Query(format!("injected {operation} failure"))
}

impl ConversationRepository for InMemoryRepository {
    async fn create_conversation(
        &self,
        owner: &UserId,
        title: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, RepositoryError> {
        if self.failures().create_conversation {
            return Err(injected("create_conversation"));
        }
        let mut state = self.state.lock().unwrap();
        let now = next_instant(&mut state);
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
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find_conversations(
        &self,
        find: &ConversationFind,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Conversation> = state
            .conversations
            .iter()
            .filter(|c| matches_find(c, find))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn get_conversation(
        &self,
        find: &ConversationFind,
    ) -> Result<Option<Conversation>, RepositoryError> {
        if self.failures().get_conversation {
            return Err(injected("get_conversation"));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .iter()
            .find(|c| matches_find(c, find))
            .cloned()
            .map(|mut conversation| {
                conversation.messages = state
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == conversation.id)
                    .cloned()
                    .collect();
                conversation
            }))
    }

    async fn update_conversation(
        &self,
        update: &ConversationUpdate,
    ) -> Result<Conversation, RepositoryError> {
        if self.failures().update_conversation {
            return Err(injected("update_conversation"));
        }
        let mut state = self.state.lock().unwrap();
        let now = next_instant(&mut state);
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.uid == update.uid)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(title) = &update.title {
            conversation.title = title.clone();
        }
        conversation.updated_at = now;
        Ok(conversation.clone())
    }

    async fn delete_conversation(&self, find: &ConversationFind) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let removed: Vec<Uuid> = state
            .conversations
            .iter()
            .filter(|c| matches_find(c, find))
            .map(|c| c.id)
            .collect();
        state.conversations.retain(|c| !removed.contains(&c.id));
        state
            .messages
            .retain(|m| !removed.contains(&m.conversation_id));
        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        if self.failures().create_message {
            return Err(injected("create_message"));
        }
        let mut state = self.state.lock().unwrap();
        let now = next_instant(&mut state);
        let message = ChatMessage {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

// --- Provider ---

/// One scripted stream item.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Fail(String),
    AuthFail,
}

pub fn text(s: &str) -> Step {
    Step::Text(s.to_string())
}

/// Outcome of the non-streaming title request.
#[derive(Debug, Clone)]
pub enum Completion {
    Reply(String),
    Fail(String),
}

/// Provider that replays a fixed script and records what it was asked.
#[derive(Clone)]
pub struct ScriptedProvider {
    connected: bool,
    steps: Vec<Step>,
    completion: Completion,
    pub stream_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub complete_requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    /// A stream that connects and then yields `steps`.
    pub fn streaming(steps: Vec<Step>) -> Self {
        Self {
            connected: true,
            steps,
            completion: Completion::Reply("Fallback Title".to_string()),
            stream_requests: Arc::new(Mutex::new(Vec::new())),
            complete_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A stream whose very first item is `step` (no `Connected` event), the way
    /// the HTTP adapter reports an error status.
    pub fn failing_setup(step: Step) -> Self {
        Self {
            connected: false,
            ..Self::streaming(vec![step])
        }
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.complete_requests.lock().unwrap().push(request.clone());
        match &self.completion {
            Completion::Reply(content) => Ok(CompletionResponse {
                id: "resp-title".to_string(),
                content: content.clone(),
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Completion::Fail(message) => Err(LlmError::Provider {
                message: message.clone(),
            }),
        }
    }

    fn stream(&self, request: CompletionRequest) -> ProviderStream {
        self.stream_requests.lock().unwrap().push(request);
        let connected = self.connected;
        let steps = self.steps.clone();
        Box::pin(async_stream::stream! {
            if connected {
                yield Ok(StreamEvent::Connected);
            }
            for step in steps {
                match step {
                    Step::Text(text) => yield Ok(StreamEvent::TextDelta { text }),
                    Step::Fail(message) => {
                        yield Err(LlmError::Provider { message });
                        return;
                    }
                    Step::AuthFail => {
                        yield Err(LlmError::AuthenticationFailed);
                        return;
                    }
                }
            }
            yield Ok(StreamEvent::Done);
        })
    }
}

/// Factory handing out clones of one scripted provider.
pub struct ScriptedFactory {
    provider: ScriptedProvider,
    pub created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self {
            provider,
            created: AtomicUsize::new(0),
        }
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, _settings: &ResolvedAiSettings) -> Result<BoxLlmProvider, LlmError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(BoxLlmProvider::new(self.provider.clone()))
    }
}

pub fn ai_settings() -> AiSettings {
    AiSettings {
        base_url: Some("http://localhost:8080/v1".to_string()),
        api_key: Some("sk-test".to_string()),
        model: Some("test-model".to_string()),
    }
}

// --- Diagnostics ---

#[derive(Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.reports.lock().unwrap().iter().map(|d| d.kind).collect()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.reports.lock().unwrap().push(diagnostic);
    }
}

// --- Events ---

/// Everything currently buffered in the receiver.
pub fn drain_events(rx: &mut mpsc::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
