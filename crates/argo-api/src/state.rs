//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use argo_chat::{LanguageModel, TurnDependencies, TurnOrchestrator};
use argo_core::config::ArgoConfig;
use argo_core::services::{BankData, BankLink, ConversationStore};
use argo_storage::{AttachmentRepository, ConversationRepository, Database, ObjectStore, UserRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArgoConfig>,
    pub database: Arc<Database>,
    pub users: Arc<UserRepository>,
    pub conversations: Arc<dyn ConversationStore>,
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Bank collaborators; `None` when aggregator credentials are absent.
    pub bank: Option<Arc<dyn BankData>>,
    pub bank_link: Option<Arc<dyn BankLink>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire storage repositories and the turn orchestrator around the given
    /// external collaborators.
    pub fn new(
        config: ArgoConfig,
        database: Arc<Database>,
        model: Arc<dyn LanguageModel>,
        bank: Option<Arc<dyn BankData>>,
        bank_link: Option<Arc<dyn BankLink>>,
    ) -> Self {
        let objects = Arc::new(ObjectStore::new(database.clone()));
        let conversations: Arc<dyn ConversationStore> = Arc::new(ConversationRepository::new(
            database.clone(),
            objects.clone(),
            config.storage.transcripts_bucket.clone(),
        ));
        let attachments = Arc::new(AttachmentRepository::new(
            objects,
            config.storage.effective_attachments_bucket(),
        ));

        let orchestrator = TurnOrchestrator::new(
            TurnDependencies {
                conversations: conversations.clone(),
                attachments,
                model,
                bank: bank.clone(),
            },
            config.chat.clone(),
            config.model.max_output_tokens,
            config.model.extraction_max_tokens,
        );

        Self {
            users: Arc::new(UserRepository::new(database.clone())),
            config: Arc::new(config),
            database,
            conversations,
            orchestrator: Arc::new(orchestrator),
            bank,
            bank_link,
            start_time: Instant::now(),
        }
    }
}
