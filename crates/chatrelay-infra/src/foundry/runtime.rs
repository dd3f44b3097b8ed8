//! FoundryRuntime -- concrete [`AgentRuntime`] for the hosted agents API of
//! an AI project.
//!
//! Every request carries a bearer token from [`ClientSecretCredential`] and
//! the `api-version` query parameter. Runs are created and then polled until
//! they reach a terminal status.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use chatrelay_core::agent::runtime::AgentRuntime;
use chatrelay_types::agent::{AgentInfo, AgentRun, AgentThread, MessageRole, ThreadMessage};
use chatrelay_types::error::RuntimeError;

use super::auth::ClientSecretCredential;
use crate::config::FoundrySettings;

/// Messages fetched per lookup of the latest message by role.
const MESSAGE_PAGE_SIZE: &str = "20";

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Agent runtime backed by the project's REST endpoint.
pub struct FoundryRuntime {
    client: reqwest::Client,
    endpoint: String,
    credential: ClientSecretCredential,
    poll_interval: Duration,
}

impl FoundryRuntime {
    /// The agents API version sent with every request.
    const API_VERSION: &'static str = "v1";

    pub fn new(settings: &FoundrySettings, poll_interval: Duration) -> Result<Self, RuntimeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RuntimeError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credential: ClientSecretCredential::new(client.clone(), settings),
            client,
            endpoint: settings.project_endpoint.trim_end_matches('/').to_string(),
            poll_interval,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RuntimeError> {
        let token = self.credential.token().await?;
        Ok(self
            .client
            .request(method, self.url(path))
            .query(&[("api-version", Self::API_VERSION)])
            .bearer_auth(token.expose_secret()))
    }

    /// Send and decode, mapping failures onto [`RuntimeError`].
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RuntimeError> {
        let response = request
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RuntimeError::Deserialization(e.to_string()))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<AgentRun, RuntimeError> {
        let request = self
            .request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}"))
            .await?;
        self.send(request).await
    }
}

impl AgentRuntime for FoundryRuntime {
    async fn authenticate(&self) -> Result<(), RuntimeError> {
        self.credential.token().await.map(|_| ())
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentInfo>, RuntimeError> {
        let request = self
            .request(Method::GET, &format!("assistants/{agent_id}"))
            .await?;
        match self.send::<AgentInfo>(request).await {
            Ok(agent) => Ok(Some(agent)),
            Err(RuntimeError::Http { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_thread(&self) -> Result<AgentThread, RuntimeError> {
        let request = self
            .request(Method::POST, "threads")
            .await?
            .json(&serde_json::json!({}));
        let thread: AgentThread = self.send(request).await?;
        debug!(thread_id = %thread.id, "created thread");
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<AgentThread, RuntimeError> {
        let request = self
            .request(Method::GET, &format!("threads/{thread_id}"))
            .await?;
        self.send(request).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RuntimeError> {
        let request = self
            .request(Method::POST, &format!("threads/{thread_id}/messages"))
            .await?
            .json(&serde_json::json!({
                "role": role.to_string(),
                "content": content,
            }));
        self.send::<serde_json::Value>(request).await.map(|_| ())
    }

    async fn create_and_process_run(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<AgentRun, RuntimeError> {
        let request = self
            .request(Method::POST, &format!("threads/{thread_id}/runs"))
            .await?
            .json(&serde_json::json!({ "assistant_id": agent_id }));
        let mut run: AgentRun = self.send(request).await?;
        debug!(run_id = %run.id, status = %run.status, "run created");

        while !run.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            run = self.get_run(thread_id, &run.id).await?;
        }

        debug!(run_id = %run.id, status = %run.status, "run finished");
        Ok(run)
    }

    async fn last_message_by_role(
        &self,
        thread_id: &str,
        role: MessageRole,
    ) -> Result<Option<ThreadMessage>, RuntimeError> {
        let request = self
            .request(Method::GET, &format!("threads/{thread_id}/messages"))
            .await?
            .query(&[("order", "desc"), ("limit", MESSAGE_PAGE_SIZE)]);
        let page: ListResponse<ThreadMessage> = self.send(request).await?;
        Ok(page.data.into_iter().find(|m| m.role == role))
    }
}
