use thiserror::Error;

/// Errors from repository operations (used by trait definitions in chatrelay-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("ambiguous lookup: {0} records matched")]
    Ambiguous(usize),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The store rejected the document's text encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by an agent runtime adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl RuntimeError {
    /// Remote call failures that may heal on their own.
    pub fn is_remote_http(&self) -> bool {
        matches!(self, RuntimeError::Http { .. } | RuntimeError::Transport(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RuntimeError::Http { status: 429, .. })
    }
}

/// Errors surfaced by the agent client.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent id is not set")]
    MissingAgentId,

    #[error("agent with id {0} not found")]
    AgentNotFound(String),

    #[error("agent client is not initialized")]
    NotInitialized,

    #[error("thread is not initialized")]
    ThreadNotInitialized,

    #[error("input message cannot be empty")]
    EmptyMessage,

    #[error("agent returned a message without text content")]
    EmptyResponse,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("agent call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Errors from the retrieval (search) service.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval request failed: {0}")]
    Request(String),

    #[error("retrieval service returned HTTP {0}")]
    Status(u16),

    #[error("invalid retrieval payload: {0}")]
    Decode(String),
}

/// Errors while loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
