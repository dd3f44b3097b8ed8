//! Business logic and port definitions for chatrelay.
//!
//! This crate defines the "ports" (agent runtime, document container,
//! retriever) that the infrastructure layer implements, plus the logic built
//! on them: the agent client with bounded retry, the generic document
//! repository, prompt enrichment, background persistence and the chat
//! service. It depends only on `chatrelay-types`, never on
//! `chatrelay-infra` or any database/IO crate.

pub mod agent;
pub mod chat;
pub mod persist;
pub mod repository;
pub mod retrieval;
