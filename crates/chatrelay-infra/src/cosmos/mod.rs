//! Cosmos DB document store adapter.
//!
//! `CosmosContainer` implements `DocumentContainer` against the Cosmos DB
//! REST API using master-key signed requests.

pub mod auth;
pub mod container;

pub use container::CosmosContainer;
