//! Shared domain types for chatrelay.
//!
//! This crate contains the data shapes used across the workspace: the
//! conversation model, agent runtime shapes, retrieval results, service
//! configuration, and the error enums.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod retrieval;
pub mod store;
