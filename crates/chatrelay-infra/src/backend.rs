//! Document store selection.
//!
//! `DocumentBackend` wraps whichever container the environment selects so the
//! rest of the service is generic over a single concrete type.

use chatrelay_core::repository::{DocumentContainer, Filters, Record};
use chatrelay_types::error::RepositoryError;
use serde_json::Value;
use tracing::info;

use crate::config::StoreSettings;
use crate::cosmos::CosmosContainer;
use crate::sqlite::container::SqliteContainer;
use crate::sqlite::pool::DatabasePool;

/// The configured document store.
pub enum DocumentBackend {
    Cosmos(CosmosContainer),
    Sqlite(SqliteContainer),
}

impl DocumentBackend {
    /// Open the store holding records of type `T`.
    ///
    /// Cosmos DB uses the configured container name (checked on first use)
    /// and `T::PARTITION_KEY`. SQLite uses `T::CONTAINER` and runs migrations.
    pub async fn connect<T: Record>(settings: &StoreSettings) -> Result<Self, RepositoryError> {
        match settings {
            StoreSettings::Cosmos(cosmos) => {
                info!(database = %cosmos.database, "using Cosmos DB document store");
                let container = CosmosContainer::new(cosmos, T::PARTITION_KEY)?;
                Ok(Self::Cosmos(container))
            }
            StoreSettings::Sqlite { url } => {
                info!(url = %url, "using SQLite document store");
                let pool = DatabasePool::new(url)
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))?;
                Ok(Self::Sqlite(SqliteContainer::new(pool, T::CONTAINER)))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cosmos(_) => "cosmos",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl DocumentContainer for DocumentBackend {
    async fn upsert(&self, partition_key: &Value, document: &Value) -> Result<Value, RepositoryError> {
        match self {
            Self::Cosmos(c) => c.upsert(partition_key, document).await,
            Self::Sqlite(c) => c.upsert(partition_key, document).await,
        }
    }

    async fn query(&self, filters: &Filters) -> Result<Vec<Value>, RepositoryError> {
        match self {
            Self::Cosmos(c) => c.query(filters).await,
            Self::Sqlite(c) => c.query(filters).await,
        }
    }

    async fn delete(&self, id: &str, partition_key: &Value) -> Result<(), RepositoryError> {
        match self {
            Self::Cosmos(c) => c.delete(id, partition_key).await,
            Self::Sqlite(c) => c.delete(id, partition_key).await,
        }
    }

    async fn read_all(&self) -> Result<Vec<Value>, RepositoryError> {
        match self {
            Self::Cosmos(c) => c.read_all().await,
            Self::Sqlite(c) => c.read_all().await,
        }
    }
}
