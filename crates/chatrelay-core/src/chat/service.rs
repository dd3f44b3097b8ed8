//! Chat service handling one request end to end.
//!
//! Flow: validate -> retrieve context (best effort) -> agent client
//! (initialize, thread, invoke, close) -> assemble the conversation ->
//! enqueue persistence -> reply. Only validation and agent failures reach
//! the caller; retrieval and persistence problems are logged and swallowed.

use std::sync::Arc;

use chatrelay_types::chat::{ChatInput, Conversation, DEFAULT_AGENT_LABEL, DEFAULT_CHANNEL};
use chatrelay_types::config::ServiceConfig;
use chatrelay_types::error::AgentError;
use chatrelay_types::retrieval::SearchQuery;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::agent::client::{AgentClient, Invocation};
use crate::agent::retry::RetryPolicy;
use crate::agent::runtime::AgentRuntime;
use crate::persist::PersistQueue;
use crate::retrieval::{ContextRetriever, enrich_prompt, format_context};

/// Message returned when a request lacks `message` or `agent_id`.
pub const MISSING_FIELDS_MESSAGE: &str = "Pass in a message and agentid in the query string or in the request body for a personalized response.";

/// Inbound chat request, already merged from query string and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub agent_id: Option<String>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    /// Forwarded to retrieval and echoed back.
    pub filter: Option<String>,
}

/// Successful outcome of one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub thread_id: String,
    pub agent_id: String,
    pub filter: Option<String>,
    pub retries: u32,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Per-service knobs taken from [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub policy: RetryPolicy,
    pub agent_label: String,
    pub channel: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            agent_label: DEFAULT_AGENT_LABEL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl From<&ServiceConfig> for ChatSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            policy: RetryPolicy::from(&config.retry),
            agent_label: config.agent.agent_label.clone(),
            channel: config.agent.channel.clone(),
        }
    }
}

/// Orchestrates one chat turn.
///
/// Generic over the runtime and retriever ports so chatrelay-core never
/// depends on chatrelay-infra.
pub struct ChatService<A: AgentRuntime, S: ContextRetriever> {
    runtime: Arc<A>,
    retriever: Option<Arc<S>>,
    queue: PersistQueue,
    settings: ChatSettings,
}

impl<A: AgentRuntime, S: ContextRetriever> ChatService<A, S> {
    pub fn new(
        runtime: Arc<A>,
        retriever: Option<Arc<S>>,
        queue: PersistQueue,
        settings: ChatSettings,
    ) -> Self {
        Self {
            runtime,
            retriever,
            queue,
            settings,
        }
    }

    /// Handle one request.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let (message, agent_id) = match (
            non_empty(request.message.as_deref()),
            non_empty(request.agent_id.as_deref()),
        ) {
            (Some(message), Some(agent_id)) => (message.to_string(), agent_id.to_string()),
            _ => return Err(ChatError::Validation(MISSING_FIELDS_MESSAGE.to_string())),
        };
        let thread_id = request.thread_id.clone().filter(|t| !t.trim().is_empty());

        info!(
            %agent_id,
            thread_id = thread_id.as_deref().unwrap_or_default(),
            "received chat message"
        );

        let context = self.retrieve_context(&message, request.filter.clone()).await;
        let prompt = match &context {
            Some(context) => enrich_prompt(&message, context),
            None => message.clone(),
        };

        let mut client = AgentClient::new(self.runtime.clone(), agent_id.clone(), thread_id)?
            .with_policy(self.settings.policy.clone())
            .with_agent_label(self.settings.agent_label.clone());

        let outcome = run_agent(&mut client, &prompt).await;
        client.close().await;
        let invocation = outcome?;

        let reply = ChatReply {
            message: invocation.response.content.clone(),
            thread_id: invocation.thread_id.clone(),
            agent_id,
            filter: request.filter.clone(),
            retries: invocation.response.retries,
        };

        self.schedule_persist(&request, message, context, invocation);
        Ok(reply)
    }

    async fn retrieve_context(&self, message: &str, filter: Option<String>) -> Option<String> {
        let retriever = self.retriever.as_ref()?;
        let query = SearchQuery {
            text: message.to_string(),
            filter,
        };

        match retriever.search(&query).await {
            Ok(result) => {
                info!(documents = result.documents.len(), "documents retrieved");
                format_context(&result)
            }
            Err(e) => {
                error!(error = %e, "error retrieving documents, continuing without context");
                None
            }
        }
    }

    fn schedule_persist(
        &self,
        request: &ChatRequest,
        message: String,
        context: Option<String>,
        invocation: Invocation,
    ) {
        let input = ChatInput::new(message)
            .with_channel(self.settings.channel.clone())
            .with_user_id(request.user_id.clone())
            .with_context(context);

        let mut conversation = Conversation::new(invocation.thread_id, input)
            .with_response(invocation.response, invocation.token_usage);
        conversation.touch(request.user_id.as_deref().unwrap_or("anonymous"));

        if let Err(e) = self.queue.enqueue(conversation) {
            warn!(error = %e, "conversation will not be persisted");
        }
    }
}

async fn run_agent<A: AgentRuntime>(
    client: &mut AgentClient<A>,
    prompt: &str,
) -> Result<Invocation, AgentError> {
    client.initialize().await?;
    client.create_or_get_thread().await?;
    client.invoke(prompt).await
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
