//! Chat trigger handler.
//!
//! Fields are read from the query string first. If `message` or the agent id
//! is still missing, the JSON body fills the gaps field by field. A body that
//! is absent or not JSON is ignored.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use chatrelay_core::chat::ChatRequest;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request fields accepted in the query string or the JSON body.
#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    pub message: Option<String>,
    #[serde(alias = "agentid")]
    pub agent_id: Option<String>,
    #[serde(alias = "threadid")]
    pub thread_id: Option<String>,
    #[serde(alias = "userid")]
    pub user_id: Option<String>,
    pub filter: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ChatParams {
    fn is_complete(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        has(&self.message) && has(&self.agent_id)
    }

    /// Keep our values, taking each missing one from `fallback`.
    fn or(self, fallback: ChatParams) -> ChatParams {
        ChatParams {
            message: present(self.message).or(fallback.message),
            agent_id: present(self.agent_id).or(fallback.agent_id),
            thread_id: present(self.thread_id).or(fallback.thread_id),
            user_id: present(self.user_id).or(fallback.user_id),
            filter: present(self.filter).or(fallback.filter),
        }
    }
}

impl From<ChatParams> for ChatRequest {
    fn from(params: ChatParams) -> Self {
        ChatRequest {
            message: params.message,
            agent_id: params.agent_id,
            thread_id: params.thread_id,
            user_id: params.user_id,
            filter: params.filter,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub message: String,
    pub thread_id: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// GET|POST /api/agent_httptrigger - Send a message to an agent.
pub async fn agent_httptrigger(
    State(state): State<AppState>,
    Query(query): Query<ChatParams>,
    body: Bytes,
) -> Result<Json<ChatResponseBody>, AppError> {
    let mut params = query;
    if !params.is_complete() {
        if let Ok(from_body) = serde_json::from_slice::<ChatParams>(&body) {
            params = params.or(from_body);
        }
    }

    let reply = state
        .chat_service
        .handle(params.into())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chat request failed");
            AppError::from(e)
        })?;

    Ok(Json(ChatResponseBody {
        message: reply.message,
        thread_id: reply.thread_id,
        agent_id: reply.agent_id,
        filter: reply.filter,
    }))
}
