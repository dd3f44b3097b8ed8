//! Infrastructure layer for chatrelay.
//!
//! Contains implementations of the ports defined in `chatrelay-core`: the
//! hosted agent runtime over REST, Cosmos DB and SQLite document containers,
//! the search service client, and configuration loading.

pub mod backend;
pub mod config;
pub mod cosmos;
pub mod foundry;
pub mod retrieval;
pub mod sqlite;
