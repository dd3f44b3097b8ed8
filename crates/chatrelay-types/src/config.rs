//! Service configuration types for chatrelay.
//!
//! `ServiceConfig` represents the optional `chatrelay.toml` that tunes the
//! HTTP listener, the agent retry policy, the persistence queue and logging.
//! Credentials never live here; they come from the environment.

use serde::{Deserialize, Serialize};

/// Top-level configuration. All sections and fields have defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7071
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Bounded retry policy for agent runs.
///
/// The wait after attempt `n` is `multiplier * 2^(n-1)` seconds clamped to
/// `[min_wait_secs, max_wait_secs]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: f64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_min_wait_secs() -> f64 {
    6.0
}

fn default_max_wait_secs() -> f64 {
    10.0
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_wait_secs: default_min_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Capacity of the conversation save queue. Jobs beyond it are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Delay between run status polls while a run is in progress.
    #[serde(default = "default_run_poll_interval_ms")]
    pub run_poll_interval_ms: u64,
    /// Display label stored on every response.
    #[serde(default = "default_agent_label")]
    pub agent_label: String,
    /// Channel label stored on every request.
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_run_poll_interval_ms() -> u64 {
    1_000
}

fn default_agent_label() -> String {
    crate::chat::DEFAULT_AGENT_LABEL.to_string()
}

fn default_channel() -> String {
    crate::chat::DEFAULT_CHANNEL.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            run_poll_interval_ms: default_run_poll_interval_ms(),
            agent_label: default_agent_label(),
            channel: default_channel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Base filter directive; `RUST_LOG` overrides it when set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Export spans through OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            otel: false,
        }
    }
}
