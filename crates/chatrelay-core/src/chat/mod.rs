//! Chat turn orchestration.
//!
//! `ChatService` validates a request, enriches the prompt with retrieved
//! context, runs one agent invocation and schedules the turn for persistence.

pub mod service;

pub use service::{ChatError, ChatReply, ChatRequest, ChatService, ChatSettings};
