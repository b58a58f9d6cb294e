//! Generation orchestrator.
//!
//! `GenerationService::start` validates the request, prepares the outbound
//! conversation and opens the provider stream. The returned [`Generation`]
//! then relays the stream to the caller, persists the exchange and settles the
//! conversation title:
//!
//! ```text
//! model_ready, content*, output_complete, session_updated?, title_generated?, output_end
//! ```
//!
//! Persistence failures are never fatal; they go to the [`DiagnosticSink`].

use std::sync::Arc;

use futures_util::StreamExt;
use parley_types::chat::{
    Conversation, ConversationFind, ConversationStatus, ConversationUpdate, ConversationView,
    MessageRole, UserId,
};
use parley_types::config::AiSettings;
use parley_types::error::ChatError;
use parley_types::event::GenerationEvent;
use parley_types::llm::{CompletionRequest, Message, StreamEvent};
use tracing::{debug, info};

use crate::chat::repository::ConversationRepository;
use crate::generation::classify::{classify_setup_error, classify_stream_error};
use crate::generation::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::generation::scanner::TitleScanner;
use crate::generation::sink::EventSink;
use crate::generation::title::{FallbackTitle, PLACEHOLDER_TITLE, title_instruction};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::ProviderStream;
use crate::task::TaskPool;

/// A caller's generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Ordered conversation input; must not be empty.
    pub messages: Vec<Message>,
    /// Handle of an existing conversation to continue.
    pub conversation_uid: Option<String>,
}

/// Entry point for streaming generations.
pub struct GenerationService<R> {
    repo: Arc<R>,
    settings: AiSettings,
    factory: Arc<dyn ProviderFactory>,
    diagnostics: Arc<dyn DiagnosticSink>,
    tasks: TaskPool,
}

impl<R> Clone for GenerationService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            settings: self.settings.clone(),
            factory: self.factory.clone(),
            diagnostics: self.diagnostics.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

impl<R: ConversationRepository + 'static> GenerationService<R> {
    pub fn new(
        repo: Arc<R>,
        settings: AiSettings,
        factory: Arc<dyn ProviderFactory>,
        diagnostics: Arc<dyn DiagnosticSink>,
        tasks: TaskPool,
    ) -> Self {
        Self {
            repo,
            settings,
            factory,
            diagnostics,
            tasks,
        }
    }

    /// Validate, prepare and open the provider stream.
    ///
    /// Errors returned here happen before any event is sent.
    #[tracing::instrument(
        name = "generation_start",
        skip(self, caller, request),
        fields(conversation_uid = request.conversation_uid.as_deref().unwrap_or("-"))
    )]
    pub async fn start(
        &self,
        caller: Option<&UserId>,
        request: GenerationRequest,
    ) -> Result<Generation<R>, ChatError> {
        let owner = caller
            .cloned()
            .ok_or_else(|| ChatError::Unauthenticated("user not authenticated".to_string()))?;

        if request.messages.is_empty() {
            return Err(ChatError::InvalidArgument(
                "at least one message is required".to_string(),
            ));
        }

        let settings = self.settings.resolve()?;

        let existing = match &request.conversation_uid {
            Some(uid) => {
                let find = ConversationFind::by_uid(uid).owned_by(&owner);
                match self.repo.get_conversation(&find).await {
                    Ok(Some(conversation)) => Some(conversation),
                    Ok(None) => {
                        return Err(ChatError::NotFound(format!("conversation {uid} not found")));
                    }
                    Err(e) => {
                        return Err(ChatError::Internal(format!(
                            "failed to get conversation: {e}"
                        )));
                    }
                }
            }
            None => None,
        };

        let mut outbound = Vec::with_capacity(request.messages.len() + 1);
        if existing.is_none() {
            outbound.push(Message::system(title_instruction()));
        }
        outbound.extend(request.messages.iter().cloned());

        let provider = self
            .factory
            .create(&settings)
            .map_err(|e| classify_setup_error(&e))?;
        let mut stream = provider.stream(CompletionRequest {
            model: settings.model.clone(),
            messages: outbound,
            max_tokens: None,
            temperature: None,
            stream: true,
        });

        // The stream is open once its first item arrives.
        let (pending, exhausted) = match stream.next().await {
            Some(Ok(StreamEvent::Connected)) => (None, false),
            Some(Ok(event)) => (Some(event), false),
            Some(Err(e)) => return Err(classify_setup_error(&e)),
            None => (None, true),
        };

        debug!(provider = provider.name(), model = %settings.model, "Provider stream opened");

        Ok(Generation {
            repo: self.repo.clone(),
            diagnostics: self.diagnostics.clone(),
            tasks: self.tasks.clone(),
            provider: Arc::new(provider),
            model: settings.model,
            owner,
            inputs: request.messages,
            existing,
            stream,
            pending,
            exhausted,
        })
    }

    /// `start` followed by `run`.
    pub async fn generate<S>(
        &self,
        caller: Option<&UserId>,
        request: GenerationRequest,
        sink: S,
    ) -> Result<(), ChatError>
    where
        S: EventSink + 'static,
    {
        self.start(caller, request).await?.run(sink).await
    }
}

/// A generation whose provider stream is open but not yet relayed.
pub struct Generation<R> {
    repo: Arc<R>,
    diagnostics: Arc<dyn DiagnosticSink>,
    tasks: TaskPool,
    provider: Arc<BoxLlmProvider>,
    model: String,
    owner: UserId,
    inputs: Vec<Message>,
    existing: Option<Conversation>,
    stream: ProviderStream,
    pending: Option<StreamEvent>,
    exhausted: bool,
}

impl<R: ConversationRepository + 'static> Generation<R> {
    /// Relay the stream to `sink`, then persist and finish.
    ///
    /// Returns an error when the provider fails mid-stream or the caller's
    /// stream is closed; events already sent stay sent. A fallback title job,
    /// if needed, is scheduled after the synchronous sequence has ended.
    #[tracing::instrument(name = "generation_run", skip_all, fields(model = %self.model))]
    pub async fn run<S>(mut self, sink: S) -> Result<(), ChatError>
    where
        S: EventSink + 'static,
    {
        let mut fallback = None;
        let result = self.drive(&sink, &mut fallback).await;

        if let Some(job) = fallback {
            debug!(conversation_uid = %job.conversation_uid, "No title in stream, scheduling fallback");
            self.tasks.spawn_detached("fallback_title", job.run(sink));
        }
        result
    }

    async fn drive<S: EventSink>(
        &mut self,
        sink: &S,
        fallback: &mut Option<FallbackTitle<R>>,
    ) -> Result<(), ChatError> {
        send(sink, GenerationEvent::model_ready()).await?;

        let mut scanner = TitleScanner::new();
        if let Some(event) = self.pending.take() {
            relay(event, &mut scanner, sink).await?;
        }
        if !self.exhausted {
            while let Some(item) = self.stream.next().await {
                let event = item.map_err(|e| classify_stream_error(&e))?;
                relay(event, &mut scanner, sink).await?;
            }
        }
        if let Some(text) = scanner.finish().visible {
            send(sink, GenerationEvent::content(text)).await?;
        }

        send(sink, GenerationEvent::output_complete()).await?;

        if scanner.raw().is_empty() {
            debug!("Provider returned an empty response, nothing to persist");
            return send(sink, GenerationEvent::output_end()).await;
        }

        let content = scanner.visible_content();
        let title = scanner.title().map(str::to_string);

        let (conversation, created) = match self.existing.take() {
            Some(conversation) => (Some(conversation), false),
            None => (self.create_conversation(title.as_deref()).await, true),
        };

        if let Some(conversation) = conversation {
            self.persist_exchange(&conversation, &content).await;

            if created {
                // Scheduled even if the caller has gone away below.
                if title.is_none() {
                    *fallback = Some(self.fallback_title(&conversation, content));
                }

                let view = self.load_view(&conversation).await;
                send(
                    sink,
                    GenerationEvent::session_updated(view.clone()).with_message("Session created"),
                )
                .await?;

                if title.is_some() {
                    send(
                        sink,
                        GenerationEvent::title_generated(view).with_message("Title generated"),
                    )
                    .await?;
                }
            }
        }

        send(sink, GenerationEvent::output_end()).await
    }

    async fn create_conversation(&mut self, title: Option<&str>) -> Option<Conversation> {
        let title = title.unwrap_or(PLACEHOLDER_TITLE);
        match self
            .repo
            .create_conversation(&self.owner, title, ConversationStatus::Active)
            .await
        {
            Ok(conversation) => {
                info!(conversation_uid = %conversation.uid, owner = %self.owner, "Created conversation");
                Some(conversation)
            }
            Err(e) => {
                self.diagnostics.report(Diagnostic::new(
                    DiagnosticKind::ConversationCreateFailed,
                    format!("failed to create conversation: {e}"),
                ));
                None
            }
        }
    }

    /// User inputs, then the assistant reply, then the timestamp bump. Each
    /// step is attempted even when an earlier one failed.
    async fn persist_exchange(&mut self, conversation: &Conversation, content: &str) {
        let report = |kind: DiagnosticKind, detail: String| {
            self.diagnostics
                .report(Diagnostic::new(kind, detail).for_conversation(&conversation.uid));
        };

        for input in self.inputs.iter().filter(|m| m.role == MessageRole::User) {
            if let Err(e) = self
                .repo
                .create_message(&conversation.id, MessageRole::User, &input.content)
                .await
            {
                report(
                    DiagnosticKind::MessagePersistFailed,
                    format!("failed to save user message: {e}"),
                );
            }
        }

        if let Err(e) = self
            .repo
            .create_message(&conversation.id, MessageRole::Assistant, content)
            .await
        {
            report(
                DiagnosticKind::MessagePersistFailed,
                format!("failed to save assistant message: {e}"),
            );
        }

        if let Err(e) = self
            .repo
            .update_conversation(&ConversationUpdate::touch(&conversation.uid))
            .await
        {
            report(
                DiagnosticKind::ConversationTouchFailed,
                format!("failed to update conversation timestamp: {e}"),
            );
        }
    }

    /// Public projection including the persisted messages, or the bare record
    /// when it cannot be reloaded.
    async fn load_view(&mut self, conversation: &Conversation) -> ConversationView {
        let find = ConversationFind::by_uid(&conversation.uid).owned_by(&self.owner);
        match self.repo.get_conversation(&find).await {
            Ok(Some(reloaded)) => ConversationView::from(&reloaded),
            _ => ConversationView::from(conversation),
        }
    }

    fn fallback_title(&self, conversation: &Conversation, content: String) -> FallbackTitle<R> {
        let first_user_message = self
            .inputs
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        FallbackTitle {
            repo: self.repo.clone(),
            provider: self.provider.clone(),
            diagnostics: self.diagnostics.clone(),
            model: self.model.clone(),
            conversation_uid: conversation.uid.clone(),
            first_user_message,
            assistant_content: content,
        }
    }
}

async fn send<S: EventSink>(sink: &S, event: GenerationEvent) -> Result<(), ChatError> {
    sink.send(event)
        .await
        .map_err(|_| ChatError::Internal("failed to send response to client".to_string()))
}

async fn relay<S: EventSink>(
    event: StreamEvent,
    scanner: &mut TitleScanner,
    sink: &S,
) -> Result<(), ChatError> {
    if let StreamEvent::TextDelta { text } = event {
        if let Some(visible) = scanner.consume(&text).visible {
            send(sink, GenerationEvent::content(visible)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::title::TITLE_MAX_TOKENS;
    use crate::test_support::{
        Completion, Failures, InMemoryRepository, RecordingDiagnostics, ScriptedFactory,
        ScriptedProvider, Step, ai_settings, drain_events, text,
    };
    use parley_types::event::EventKind;
    use tokio::sync::mpsc;

    struct Harness {
        service: GenerationService<InMemoryRepository>,
        repo: Arc<InMemoryRepository>,
        diagnostics: Arc<RecordingDiagnostics>,
        provider: ScriptedProvider,
        factory: Arc<ScriptedFactory>,
        tasks: TaskPool,
    }

    fn harness_with(repo: InMemoryRepository, provider: ScriptedProvider) -> Harness {
        let repo = Arc::new(repo);
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let factory = Arc::new(ScriptedFactory::new(provider.clone()));
        let tasks = TaskPool::new();
        let service = GenerationService::new(
            repo.clone(),
            ai_settings(),
            factory.clone(),
            diagnostics.clone(),
            tasks.clone(),
        );
        Harness {
            service,
            repo,
            diagnostics,
            provider,
            factory,
            tasks,
        }
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        harness_with(InMemoryRepository::new(), provider)
    }

    fn ada() -> UserId {
        UserId::new("ada")
    }

    fn ask(content: &str) -> GenerationRequest {
        GenerationRequest {
            messages: vec![Message::user(content)],
            conversation_uid: None,
        }
    }

    fn kinds(events: &[GenerationEvent]) -> Vec<EventKind> {
        events.iter().map(GenerationEvent::kind).collect()
    }

    fn content_of(events: &[GenerationEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::Content { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Run a generation to completion, wait for detached work, return all events.
    async fn run(
        h: &Harness,
        caller: Option<&UserId>,
        request: GenerationRequest,
    ) -> (Result<(), ChatError>, Vec<GenerationEvent>) {
        let (tx, mut rx) = mpsc::channel(64);
        let result = h.service.generate(caller, request, tx).await;
        h.tasks.drain().await;
        (result, drain_events(&mut rx))
    }

    #[tokio::test]
    async fn test_marker_scenario_creates_titled_conversation() {
        let h = harness(ScriptedProvider::streaming(vec![
            text("Recursion is..."),
            text("\n\nCONVERSATION_TITLE: Recursion Basics"),
        ]));

        let (result, events) = run(&h, Some(&ada()), ask("Explain recursion")).await;
        result.unwrap();

        assert_eq!(
            kinds(&events),
            vec![
                EventKind::ModelReady,
                EventKind::Content,
                EventKind::OutputComplete,
                EventKind::SessionUpdated,
                EventKind::TitleGenerated,
                EventKind::OutputEnd,
            ]
        );
        assert_eq!(content_of(&events), "Recursion is...");
        match &events[4] {
            GenerationEvent::TitleGenerated { conversation, .. } => {
                assert_eq!(conversation.title, "Recursion Basics");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let conversations = h.repo.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "Recursion Basics");
        assert_eq!(conversations[0].owner, ada());

        let messages = h.repo.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "Explain recursion");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Recursion is...");

        assert_eq!(h.provider.complete_calls(), 0);
        assert!(h.diagnostics.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_session_updated_carries_persisted_messages() {
        let h = harness(ScriptedProvider::streaming(vec![text(
            "Hi!\n\nCONVERSATION_TITLE: Greeting",
        )]));

        let (result, events) = run(&h, Some(&ada()), ask("Hello")).await;
        result.unwrap();

        let session = events
            .iter()
            .find_map(|e| match e {
                GenerationEvent::SessionUpdated { conversation, .. } => Some(conversation),
                _ => None,
            })
            .unwrap();
        assert_eq!(session.uid, h.repo.conversations()[0].uid);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Hi!");
    }

    #[tokio::test]
    async fn test_fresh_conversation_gets_title_instruction() {
        let h = harness(ScriptedProvider::streaming(vec![text("ok")]));

        let (result, _) = run(&h, Some(&ada()), ask("Hello")).await;
        result.unwrap();

        let requests = h.provider.stream_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.stream);
        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert!(request.messages[0].content.contains("CONVERSATION_TITLE:"));
        assert_eq!(request.messages[1], Message::user("Hello"));
    }

    #[tokio::test]
    async fn test_no_marker_uses_placeholder_and_runs_fallback_once() {
        let provider = ScriptedProvider::streaming(vec![text("Recursion "), text("is...")])
            .with_completion(Completion::Reply("Recursion Explained".to_string()));
        let h = harness(provider);

        let (result, events) = run(&h, Some(&ada()), ask("Explain recursion")).await;
        result.unwrap();

        // Synchronous part ends with output_end; the fallback title arrives late.
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::ModelReady,
                EventKind::Content,
                EventKind::Content,
                EventKind::OutputComplete,
                EventKind::SessionUpdated,
                EventKind::OutputEnd,
                EventKind::TitleGenerated,
            ]
        );
        match &events[4] {
            GenerationEvent::SessionUpdated { conversation, .. } => {
                assert_eq!(conversation.title, PLACEHOLDER_TITLE);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert_eq!(h.provider.complete_calls(), 1);
        let request = h.provider.complete_requests.lock().unwrap()[0].clone();
        assert_eq!(request.max_tokens, Some(TITLE_MAX_TOKENS));
        assert_eq!(request.messages[1].content, "Explain recursion");
        assert_eq!(request.messages[2].content, "Recursion is...");

        assert_eq!(h.repo.conversations()[0].title, "Recursion Explained");
    }

    #[tokio::test]
    async fn test_empty_title_after_marker_triggers_fallback() {
        let provider = ScriptedProvider::streaming(vec![text("Answer.\n\nCONVERSATION_TITLE:\n")])
            .with_completion(Completion::Reply("Fallback Title".to_string()));
        let h = harness(provider);

        let (result, events) = run(&h, Some(&ada()), ask("Question")).await;
        result.unwrap();

        assert_eq!(content_of(&events), "Answer.");
        assert_eq!(h.provider.complete_calls(), 1);
        assert_eq!(h.repo.conversations()[0].title, "Fallback Title");
        assert_eq!(h.repo.messages()[1].content, "Answer.");
    }

    #[tokio::test]
    async fn test_empty_response_persists_nothing() {
        let h = harness(ScriptedProvider::streaming(Vec::new()));

        let (result, events) = run(&h, Some(&ada()), ask("Hello")).await;
        result.unwrap();

        assert_eq!(
            kinds(&events),
            vec![EventKind::ModelReady, EventKind::OutputComplete, EventKind::OutputEnd]
        );
        assert!(h.repo.conversations().is_empty());
        assert!(h.repo.messages().is_empty());
        assert_eq!(h.provider.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_leading_whitespace_reaches_caller_and_store() {
        let h = harness(
            ScriptedProvider::streaming(vec![text("\n\n    fn main() {}"), text("\n")])
                .with_completion(Completion::Reply("Rust Entry Point".to_string())),
        );

        let (result, events) = run(&h, Some(&ada()), ask("Show a main function")).await;
        result.unwrap();

        assert_eq!(content_of(&events), "\n\n    fn main() {}\n");
        let messages = h.repo.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "\n\n    fn main() {}\n");
    }

    #[tokio::test]
    async fn test_whitespace_only_response_is_persisted() {
        let h = harness(
            ScriptedProvider::streaming(vec![text("  \n")])
                .with_completion(Completion::Reply("Blank Reply".to_string())),
        );

        let (result, events) = run(&h, Some(&ada()), ask("Say nothing")).await;
        result.unwrap();

        assert_eq!(content_of(&events), "  \n");
        assert_eq!(h.repo.conversations().len(), 1);
        assert_eq!(h.repo.messages()[1].content, "  \n");
    }

    #[tokio::test]
    async fn test_empty_response_with_existing_conversation_persists_nothing() {
        let h = harness(ScriptedProvider::streaming(Vec::new()));
        let existing = h.repo.seed(&ada(), "Old Chat");
        let before = h.repo.conversations()[0].updated_at;

        let request = GenerationRequest {
            messages: vec![Message::user("Hello")],
            conversation_uid: Some(existing.uid),
        };
        let (result, _) = run(&h, Some(&ada()), request).await;
        result.unwrap();

        assert!(h.repo.messages().is_empty());
        assert_eq!(h.repo.conversations()[0].updated_at, before);
    }

    #[tokio::test]
    async fn test_existing_conversation_appends_without_session_event() {
        let h = harness(ScriptedProvider::streaming(vec![text("Sure, continuing.")]));
        let existing = h.repo.seed(&ada(), "Old Chat");
        let before = existing.updated_at;

        let request = GenerationRequest {
            messages: vec![Message::user("Go on")],
            conversation_uid: Some(existing.uid.clone()),
        };
        let (result, events) = run(&h, Some(&ada()), request).await;
        result.unwrap();

        assert_eq!(
            kinds(&events),
            vec![
                EventKind::ModelReady,
                EventKind::Content,
                EventKind::OutputComplete,
                EventKind::OutputEnd,
            ]
        );
        let conversations = h.repo.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "Old Chat");
        assert!(conversations[0].updated_at > before);
        assert_eq!(h.repo.messages().len(), 2);
        assert_eq!(h.provider.complete_calls(), 0);

        // No title instruction for an existing conversation.
        let requests = h.provider.stream_requests.lock().unwrap();
        assert_eq!(requests[0].messages, vec![Message::user("Go on")]);
    }

    #[tokio::test]
    async fn test_system_inputs_are_forwarded_but_not_persisted() {
        let h = harness(ScriptedProvider::streaming(vec![text(
            "Bonjour\n\nCONVERSATION_TITLE: Salutations",
        )]));
        let request = GenerationRequest {
            messages: vec![Message::system("Reply in French"), Message::user("Hello")],
            conversation_uid: None,
        };

        let (result, _) = run(&h, Some(&ada()), request).await;
        result.unwrap();

        let forwarded = &h.provider.stream_requests.lock().unwrap()[0].messages;
        assert_eq!(forwarded.len(), 3);
        assert_eq!(forwarded[1], Message::system("Reply in French"));

        let roles: Vec<MessageRole> = h.repo.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let h = harness(ScriptedProvider::streaming(vec![text("unused")]));

        let err = h.service.start(None, ask("Hello")).await.err().unwrap();
        assert!(matches!(err, ChatError::Unauthenticated(_)));

        let err = h
            .service
            .start(Some(&ada()), GenerationRequest::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::InvalidArgument(_)));

        assert_eq!(h.factory.created.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_incomplete_settings_fail_precondition() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = GenerationService::new(
            repo,
            AiSettings::default(),
            Arc::new(ScriptedFactory::new(ScriptedProvider::streaming(Vec::new()))),
            Arc::new(RecordingDiagnostics::default()),
            TaskPool::new(),
        );

        let err = service.start(Some(&ada()), ask("Hello")).await.err().unwrap();
        assert!(matches!(err, ChatError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_conversation_is_not_found() {
        let h = harness(ScriptedProvider::streaming(vec![text("unused")]));
        let foreign = h.repo.seed(&UserId::new("grace"), "Grace's chat");

        for uid in ["missing".to_string(), foreign.uid] {
            let request = GenerationRequest {
                messages: vec![Message::user("Hello")],
                conversation_uid: Some(uid),
            };
            let err = h.service.start(Some(&ada()), request).await.err().unwrap();
            assert!(matches!(err, ChatError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_conversation_lookup_failure_is_internal() {
        let h = harness_with(
            InMemoryRepository::failing(Failures {
                get_conversation: true,
                ..Failures::default()
            }),
            ScriptedProvider::streaming(vec![text("unused")]),
        );
        let request = GenerationRequest {
            messages: vec![Message::user("Hello")],
            conversation_uid: Some("abc".to_string()),
        };
        let err = h.service.start(Some(&ada()), request).await.err().unwrap();
        assert!(matches!(err, ChatError::Internal(_)));
    }

    #[tokio::test]
    async fn test_setup_errors_are_classified_before_any_event() {
        let cases = [
            (Step::Fail("HTTP 429 Too Many Requests".to_string()), "RESOURCE_EXHAUSTED"),
            (Step::Fail("insufficient quota".to_string()), "FAILED_PRECONDITION"),
            (Step::AuthFail, "UNAUTHENTICATED"),
            (Step::Fail("connection reset".to_string()), "INTERNAL"),
        ];

        for (step, code) in cases {
            let h = harness(ScriptedProvider::failing_setup(step));
            let (result, events) = run(&h, Some(&ada()), ask("Hello")).await;
            assert_eq!(result.unwrap_err().code(), code);
            assert!(events.is_empty(), "no events expected for {code}");
            assert!(h.repo.conversations().is_empty());
        }
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts_with_internal() {
        let h = harness(ScriptedProvider::streaming(vec![
            text("Partial answer"),
            Step::Fail("429 rate limit".to_string()),
        ]));

        let (result, events) = run(&h, Some(&ada()), ask("Hello")).await;

        assert!(matches!(result, Err(ChatError::Internal(_))));
        assert_eq!(kinds(&events), vec![EventKind::ModelReady, EventKind::Content]);
        assert_eq!(content_of(&events), "Partial answer");
        assert!(h.repo.conversations().is_empty());
        assert!(h.repo.messages().is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_auth_failure_stays_unauthenticated() {
        let h = harness(ScriptedProvider::streaming(vec![text("x"), Step::AuthFail]));
        let (result, _) = run(&h, Some(&ada()), ask("Hello")).await;
        assert!(matches!(result, Err(ChatError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_create_failure_is_non_fatal() {
        let h = harness_with(
            InMemoryRepository::failing(Failures {
                create_conversation: true,
                ..Failures::default()
            }),
            ScriptedProvider::streaming(vec![text("Answer")]),
        );

        let (result, events) = run(&h, Some(&ada()), ask("Hello")).await;
        result.unwrap();

        assert_eq!(
            kinds(&events),
            vec![
                EventKind::ModelReady,
                EventKind::Content,
                EventKind::OutputComplete,
                EventKind::OutputEnd,
            ]
        );
        assert!(h.repo.messages().is_empty());
        assert_eq!(h.provider.complete_calls(), 0);
        assert_eq!(
            h.diagnostics.kinds(),
            vec![DiagnosticKind::ConversationCreateFailed]
        );
    }

    #[tokio::test]
    async fn test_persistence_failures_do_not_stop_later_steps() {
        let h = harness_with(
            InMemoryRepository::failing(Failures {
                create_message: true,
                ..Failures::default()
            }),
            ScriptedProvider::streaming(vec![text("Answer\n\nCONVERSATION_TITLE: Topic")]),
        );
        let request = GenerationRequest {
            messages: vec![Message::user("one"), Message::user("two")],
            conversation_uid: None,
        };

        let (result, events) = run(&h, Some(&ada()), request).await;
        result.unwrap();

        assert_eq!(events.last().map(GenerationEvent::kind), Some(EventKind::OutputEnd));
        assert_eq!(
            h.diagnostics.kinds(),
            vec![
                DiagnosticKind::MessagePersistFailed,
                DiagnosticKind::MessagePersistFailed,
                DiagnosticKind::MessagePersistFailed,
            ]
        );
        // The timestamp bump still ran after the failed inserts.
        let conversation = &h.repo.conversations()[0];
        assert!(conversation.updated_at > conversation.created_at);
    }

    #[tokio::test]
    async fn test_touch_failure_is_reported() {
        let h = harness_with(
            InMemoryRepository::failing(Failures {
                update_conversation: true,
                ..Failures::default()
            }),
            ScriptedProvider::streaming(vec![text("Answer\n\nCONVERSATION_TITLE: Topic")]),
        );

        let (result, _) = run(&h, Some(&ada()), ask("Hello")).await;
        result.unwrap();

        assert_eq!(h.repo.messages().len(), 2);
        assert_eq!(
            h.diagnostics.kinds(),
            vec![DiagnosticKind::ConversationTouchFailed]
        );
    }

    #[tokio::test]
    async fn test_caller_disconnect_before_start_persists_nothing() {
        let h = harness(ScriptedProvider::streaming(vec![text("Answer")]));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let result = h.service.generate(Some(&ada()), ask("Hello"), tx).await;

        assert!(matches!(result, Err(ChatError::Internal(_))));
        assert!(h.repo.conversations().is_empty());
        assert!(h.repo.messages().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_survives_disconnect_after_session_event() {
        let provider = ScriptedProvider::streaming(vec![text("Answer")])
            .with_completion(Completion::Reply("Late Title".to_string()));
        let h = harness(provider);
        let (tx, mut rx) = mpsc::channel(64);

        let generation = h.service.start(Some(&ada()), ask("Hello")).await.unwrap();
        let result = generation.run(tx).await;
        result.unwrap();
        // The caller goes away before the fallback finishes.
        let early = drain_events(&mut rx);
        drop(rx);
        h.tasks.drain().await;

        assert_eq!(early.last().map(GenerationEvent::kind), Some(EventKind::OutputEnd));
        assert_eq!(h.repo.conversations()[0].title, "Late Title");
        assert_eq!(h.provider.complete_calls(), 1);
    }
}
