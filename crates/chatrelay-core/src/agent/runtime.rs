//! AgentRuntime trait definition.
//!
//! The port through which the agent client talks to a hosted agent runtime.
//! Implementations live in chatrelay-infra (e.g., `FoundryRuntime`).

use chatrelay_types::agent::{AgentInfo, AgentRun, AgentThread, MessageRole, ThreadMessage};
use chatrelay_types::error::RuntimeError;

/// Remote agent runtime operations used by [`AgentClient`](super::client::AgentClient).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait AgentRuntime: Send + Sync {
    /// Acquire or refresh credentials for subsequent calls.
    fn authenticate(&self) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Resolve an agent definition. `Ok(None)` when the runtime does not know the id.
    fn get_agent(
        &self,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AgentInfo>, RuntimeError>> + Send;

    fn create_thread(
        &self,
    ) -> impl std::future::Future<Output = Result<AgentThread, RuntimeError>> + Send;

    fn get_thread(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<AgentThread, RuntimeError>> + Send;

    /// Append a message to a thread.
    fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Start a run of `agent_id` over the thread and wait for it to reach a
    /// terminal status.
    fn create_and_process_run(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<AgentRun, RuntimeError>> + Send;

    /// Most recent message in the thread authored by `role`.
    fn last_message_by_role(
        &self,
        thread_id: &str,
        role: MessageRole,
    ) -> impl std::future::Future<Output = Result<Option<ThreadMessage>, RuntimeError>> + Send;
}
