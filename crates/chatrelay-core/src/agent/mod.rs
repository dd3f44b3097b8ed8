//! Hosted agent abstractions for chatrelay.
//!
//! - `AgentRuntime`: RPITIT port implemented by chatrelay-infra
//! - `AgentClient`: one thread with one agent, with bounded retry
//! - `RetryPolicy`: attempt cap and exponential backoff

pub mod client;
pub mod retry;
pub mod runtime;
