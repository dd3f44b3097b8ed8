//! Agent runtime shapes: agents, threads, runs and thread messages.
//!
//! These mirror what a hosted agent runtime reports back. Field aliases accept
//! both the `agent_id` and the older `assistant_id` spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a message within an agent thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant", alias = "agent")]
    Agent,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Agent => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" | "agent" => Ok(MessageRole::Agent),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A resolved agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A server-side conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThread {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Token consumption reported by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Error detail attached to a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One execution pass of an agent over a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, alias = "assistant_id")]
    pub agent_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub usage: Option<RunUsage>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl AgentRun {
    /// Whether the runtime will make no further progress on this run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "failed" | "cancelled" | "expired" | "incomplete" | "requires_action"
        )
    }
}

/// Citation into a file the agent consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCitation {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
}

/// Citation to a web resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlCitation {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Annotation attached to a span of agent output text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// The marker text inside the response that this annotation replaces.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start_index: Option<u32>,
    #[serde(default)]
    pub end_index: Option<u32>,
    #[serde(default)]
    pub file_citation: Option<FileCitation>,
    #[serde(default)]
    pub url_citation: Option<UrlCitation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<TextAnnotation>,
}

/// One content part of a thread message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    #[serde(other)]
    Unsupported,
}

/// A message stored in an agent thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default, alias = "assistant_id")]
    pub agent_id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text parts in order, skipping images and other content kinds.
    pub fn text_messages(&self) -> impl Iterator<Item = &MessageText> {
        self.content.iter().filter_map(|part| match part {
            MessageContent::Text { text } => Some(text),
            MessageContent::Unsupported => None,
        })
    }

    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }
}
