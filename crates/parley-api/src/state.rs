//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over the repository trait; AppState pins them to the
//! SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::chat::service::ConversationService;
use parley_core::generation::diagnostics::TracingDiagnostics;
use parley_core::generation::service::GenerationService;
use parley_core::task::TaskPool;
use parley_infra::config::{load_config, resolve_data_dir};
use parley_infra::llm::OpenAiProviderFactory;
use parley_infra::sqlite::api_key::SqliteApiKeyStore;
use parley_infra::sqlite::conversation::SqliteConversationRepository;
use parley_infra::sqlite::pool::{DatabasePool, database_url};
use parley_types::config::ParleyConfig;

pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;
pub type ConcreteGenerationService = GenerationService<SqliteConversationRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub conversation_service: Arc<ConcreteConversationService>,
    pub generation_service: Arc<ConcreteGenerationService>,
    pub api_keys: SqliteApiKeyStore,
    /// Detached work (generations served over SSE, fallback titles).
    pub tasks: TaskPool,
    pub config: Arc<ParleyConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), ai = ?config.ai, "Loaded configuration");

        let db_pool = DatabasePool::new(&format!("{}?mode=rwc", database_url(&data_dir))).await?;
        let repo = Arc::new(SqliteConversationRepository::new(db_pool.clone()));
        let tasks = TaskPool::new();

        let generation_service = GenerationService::new(
            repo.clone(),
            config.ai.clone(),
            Arc::new(OpenAiProviderFactory),
            Arc::new(TracingDiagnostics),
            tasks.clone(),
        );

        Ok(Self {
            conversation_service: Arc::new(ConversationService::new(repo)),
            generation_service: Arc::new(generation_service),
            api_keys: SqliteApiKeyStore::new(db_pool),
            tasks,
            config: Arc::new(config),
            data_dir,
        })
    }
}
