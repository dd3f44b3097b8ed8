//! DocumentContainer trait definition.
//!
//! A partitioned collection of JSON documents. The infrastructure layer
//! (chatrelay-infra) implements it for Cosmos DB and SQLite.

use chatrelay_types::error::RepositoryError;
use serde_json::Value;

use super::filter::Filters;

/// Raw document operations against one container.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DocumentContainer: Send + Sync {
    /// Insert or replace the document with the same `id` in `partition_key`.
    ///
    /// Returns the document as stored, including store-assigned metadata.
    /// Returns `Encoding` when the store rejects the document's text.
    fn upsert(
        &self,
        partition_key: &Value,
        document: &Value,
    ) -> impl std::future::Future<Output = Result<Value, RepositoryError>> + Send;

    /// Documents matching every filter, across partitions.
    fn query(
        &self,
        filters: &Filters,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, RepositoryError>> + Send;

    /// Delete by id within a partition. Returns `NotFound` if absent.
    fn delete(
        &self,
        id: &str,
        partition_key: &Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every document in the container.
    fn read_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, RepositoryError>> + Send;
}
