//! Application state wiring all services together.
//!
//! The chat service is generic over the runtime and retriever ports;
//! AppState pins it to the concrete infra implementations.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::chat::{ChatService, ChatSettings};
use chatrelay_core::persist::{PersistQueue, PersistStats, spawn_persist_worker};
use chatrelay_core::repository::DocumentRepository;
use chatrelay_infra::backend::DocumentBackend;
use chatrelay_infra::config::AppSecrets;
use chatrelay_infra::foundry::FoundryRuntime;
use chatrelay_infra::retrieval::SearchClient;
use chatrelay_types::chat::Conversation;
use chatrelay_types::config::ServiceConfig;
use tokio::task::JoinHandle;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatService = ChatService<FoundryRuntime, SearchClient>;

pub type ConversationRepository = DocumentRepository<DocumentBackend, Conversation>;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
}

impl AppState {
    /// Connect the document store, start the persistence worker and wire the
    /// chat service.
    ///
    /// The returned handle resolves once every clone of the state is dropped
    /// and the queue has drained.
    pub async fn init(
        config: &ServiceConfig,
        secrets: &AppSecrets,
    ) -> anyhow::Result<(Self, JoinHandle<PersistStats>)> {
        let backend = DocumentBackend::connect::<Conversation>(&secrets.store).await?;
        tracing::info!(store = backend.kind(), "document store ready");
        let repository = Arc::new(ConversationRepository::new(backend));

        let (queue, rx) = PersistQueue::new(config.persistence.queue_capacity);
        let worker = spawn_persist_worker(repository, rx);

        let runtime = FoundryRuntime::new(
            &secrets.foundry,
            Duration::from_millis(config.agent.run_poll_interval_ms),
        )?;

        let retriever = match &secrets.retrieval {
            Some(settings) => Some(Arc::new(SearchClient::new(settings)?)),
            None => {
                tracing::info!("no retrieval endpoint configured, prompts are sent as-is");
                None
            }
        };

        let chat_service = ChatService::new(
            Arc::new(runtime),
            retriever,
            queue,
            ChatSettings::from(config),
        );

        Ok((
            Self {
                chat_service: Arc::new(chat_service),
            },
            worker,
        ))
    }
}
