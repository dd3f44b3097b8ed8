//! Conversation data model for chatrelay.
//!
//! These types model one chat turn between a user and a hosted agent: the
//! user's input, the agent's response with citations and token accounting,
//! and the persisted `Conversation` record that bundles them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::RunUsage;
use crate::store::StoreMeta;

/// Default channel label for inbound messages.
pub const DEFAULT_CHANNEL: &str = "Teams";

/// Default display label for the responding agent.
pub const DEFAULT_AGENT_LABEL: &str = "RAG agent";

/// Identity details for the person behind a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// User input message sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub turn: String,
    pub channel: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    pub message: String,
    /// Retrieved documents the prompt was enriched with, if any.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
    pub datetime: DateTime<Utc>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            turn: "user".to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            user_id: None,
            user: None,
            message: message.into(),
            context: None,
            attachments: None,
            datetime: Utc::now(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }
}

/// Character offsets of a citation inside the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRange {
    pub start: u32,
    pub end: u32,
}

/// A reference from agent output back to a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub position_in_response: Option<String>,
    #[serde(default)]
    pub citation_range_in_file: Option<CitationRange>,
    #[serde(rename = "citationTitle", default)]
    pub citation_title: Option<String>,
    #[serde(rename = "citationUrl", default)]
    pub citation_url: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

/// Token totals for one agent invocation, summed over every run attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub agent_id: String,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            total_tokens: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    /// Add one run's usage. A run that omits its total contributes
    /// `prompt + completion` instead.
    pub fn add(&mut self, usage: &RunUsage) {
        let total = if usage.total_tokens == 0 {
            usage.prompt_tokens + usage.completion_tokens
        } else {
            usage.total_tokens
        };
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += total;
    }
}

/// Content-safety verdict attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub threat_detection: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Agent output message sent back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub turn: String,
    /// Run identifier that produced this reply.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub agent: String,
    pub content: String,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
    #[serde(default)]
    pub safety_alert: Option<SafetyAlert>,
    #[serde(default)]
    pub retries: u32,
    pub datetime: DateTime<Utc>,
}

/// User rating of an agent reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum FeedbackScore {
    Negative,
    Neutral,
    Positive,
}

impl TryFrom<i8> for FeedbackScore {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(FeedbackScore::Negative),
            0 => Ok(FeedbackScore::Neutral),
            1 => Ok(FeedbackScore::Positive),
            other => Err(format!("invalid feedback score: {other}")),
        }
    }
}

impl From<FeedbackScore> for i8 {
    fn from(score: FeedbackScore) -> Self {
        match score {
            FeedbackScore::Negative => -1,
            FeedbackScore::Neutral => 0,
            FeedbackScore::Positive => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback: FeedbackScore,
    pub user_id: String,
    pub datetime: DateTime<Utc>,
}

/// Minimal audit record of who last touched a conversation and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub user_id: String,
    pub datetime: DateTime<Utc>,
}

impl Fingerprint {
    pub fn now(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            datetime: Utc::now(),
        }
    }
}

/// One persisted conversation turn, partitioned by `session_id` (the thread id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(flatten)]
    pub meta: StoreMeta,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// One accumulated entry per agent invocation.
    #[serde(default)]
    pub token_usage: Vec<TokenUsage>,
    #[serde(default)]
    pub feedback: Option<Vec<Feedback>>,
    pub request: ChatInput,
    #[serde(default)]
    pub response: Option<ChatResponse>,
    #[serde(default)]
    pub updated: Option<Fingerprint>,
}

impl Conversation {
    pub fn new(session_id: impl Into<String>, request: ChatInput) -> Self {
        Self {
            meta: StoreMeta::default(),
            session_id: session_id.into(),
            user_id: request.user_id.clone(),
            token_usage: Vec::new(),
            feedback: None,
            request,
            response: None,
            updated: None,
        }
    }

    pub fn with_response(mut self, response: ChatResponse, token_usage: Vec<TokenUsage>) -> Self {
        self.response = Some(response);
        self.token_usage = token_usage;
        self
    }

    /// Stamp the conversation as updated by `user_id` right now.
    pub fn touch(&mut self, user_id: impl Into<String>) {
        self.updated = Some(Fingerprint::now(user_id));
    }
}
