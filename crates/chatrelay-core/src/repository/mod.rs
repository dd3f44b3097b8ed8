//! Repository trait definitions (ports) and the generic document repository.
//!
//! These traits define the storage interface that the infrastructure layer
//! (chatrelay-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod container;
pub mod document;
pub mod filter;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod memory;

use chatrelay_types::chat::Conversation;
use chatrelay_types::error::RepositoryError;
use chatrelay_types::store::StoreMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use container::DocumentContainer;
pub use document::DocumentRepository;
pub use filter::Filters;

/// A type persisted as one document in a named container.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Container the records live in.
    const CONTAINER: &'static str;

    /// Field holding the partition value. `__` separates nested keys.
    const PARTITION_KEY: &'static str = "id";

    fn meta(&self) -> &StoreMeta;

    fn meta_mut(&mut self) -> &mut StoreMeta;
}

impl Record for Conversation {
    const CONTAINER: &'static str = "messages";
    const PARTITION_KEY: &'static str = "session_id";

    fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut StoreMeta {
        &mut self.meta
    }
}

/// Repository trait for records of type `T`.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait Repository<T: Record>: Send + Sync {
    /// Upsert the record, generating an id when absent.
    ///
    /// Returns the record as stored, with store metadata populated.
    fn save(&self, record: &T) -> impl std::future::Future<Output = Result<T, RepositoryError>> + Send;

    /// Exactly one record matching `filters`.
    ///
    /// Returns `NotFound` for zero matches and `Ambiguous` for more than one.
    fn get(
        &self,
        filters: &Filters,
    ) -> impl std::future::Future<Output = Result<T, RepositoryError>> + Send;

    /// Zero or more records matching `filters`.
    fn query(
        &self,
        filters: &Filters,
    ) -> impl std::future::Future<Output = Result<Vec<T>, RepositoryError>> + Send;

    /// Delete the record by id and partition value.
    fn delete(&self, record: &T) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every record in the container.
    fn all(&self) -> impl std::future::Future<Output = Result<Vec<T>, RepositoryError>> + Send;
}
