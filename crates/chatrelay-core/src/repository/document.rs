//! Generic repository over a [`DocumentContainer`].

use std::marker::PhantomData;

use chatrelay_types::error::RepositoryError;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::container::DocumentContainer;
use super::filter::{Filters, lookup};
use super::sanitize::{needs_sanitizing, sanitize_value};
use super::{Record, Repository};

/// Maps records of type `T` to documents in container `C`.
pub struct DocumentRepository<C, T> {
    container: C,
    _record: PhantomData<fn() -> T>,
}

impl<C: DocumentContainer, T: Record> DocumentRepository<C, T> {
    pub fn new(container: C) -> Self {
        Self {
            container,
            _record: PhantomData,
        }
    }

    pub fn container(&self) -> &C {
        &self.container
    }
}

fn serialization(e: serde_json::Error) -> RepositoryError {
    RepositoryError::Serialization(e.to_string())
}

fn to_document<T: Record>(record: &T) -> Result<Value, RepositoryError> {
    let document = serde_json::to_value(record).map_err(serialization)?;
    if !document.is_object() {
        return Err(RepositoryError::Serialization(format!(
            "{} record did not serialize to a JSON object",
            T::CONTAINER
        )));
    }
    Ok(document)
}

fn from_document<T: Record>(document: Value) -> Result<T, RepositoryError> {
    serde_json::from_value(document).map_err(serialization)
}

fn document_id(document: &Value) -> Option<&str> {
    document
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

fn partition_value<T: Record>(document: &Value) -> Result<Value, RepositoryError> {
    let path: Vec<&str> = T::PARTITION_KEY.split("__").collect();
    lookup(document, &path).cloned().ok_or_else(|| {
        RepositoryError::Serialization(format!(
            "{} record is missing partition key {}",
            T::CONTAINER,
            T::PARTITION_KEY
        ))
    })
}

/// Insert a fresh id when the document has none.
fn ensure_id(document: &mut Value) -> String {
    if let Some(id) = document_id(document) {
        return id.to_string();
    }
    let id = Uuid::now_v7().to_string();
    if let Some(map) = document.as_object_mut() {
        map.insert("id".to_string(), Value::String(id.clone()));
    }
    id
}

impl<C: DocumentContainer, T: Record> Repository<T> for DocumentRepository<C, T> {
    async fn save(&self, record: &T) -> Result<T, RepositoryError> {
        let mut document = to_document(record)?;
        let id = ensure_id(&mut document);
        let partition = partition_value::<T>(&document)?;

        let stored = match self.container.upsert(&partition, &document).await {
            Ok(stored) => stored,
            Err(RepositoryError::Encoding(reason)) if !needs_sanitizing(&document) => {
                warn!(container = T::CONTAINER, %id, %reason, "store rejected clean document encoding");
                return Err(RepositoryError::Encoding(reason));
            }
            Err(RepositoryError::Encoding(reason)) => {
                warn!(
                    container = T::CONTAINER,
                    %id,
                    %reason,
                    "store rejected document encoding, retrying with sanitized text"
                );
                sanitize_value(&mut document);
                let partition = partition_value::<T>(&document)?;
                self.container.upsert(&partition, &document).await?
            }
            Err(e) => return Err(e),
        };

        debug!(container = T::CONTAINER, %id, "record saved");

        // Some stores answer an upsert with an empty body.
        let stored = match stored {
            Value::Object(map) if !map.is_empty() => Value::Object(map),
            _ => document,
        };
        from_document(stored)
    }

    async fn get(&self, filters: &Filters) -> Result<T, RepositoryError> {
        let mut rows = self.query(filters).await?;
        match rows.len() {
            0 => Err(RepositoryError::NotFound),
            1 => rows.pop().ok_or(RepositoryError::NotFound),
            n => Err(RepositoryError::Ambiguous(n)),
        }
    }

    async fn query(&self, filters: &Filters) -> Result<Vec<T>, RepositoryError> {
        self.container
            .query(filters)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn delete(&self, record: &T) -> Result<(), RepositoryError> {
        let document = to_document(record)?;
        let id = document_id(&document).ok_or(RepositoryError::NotFound)?;
        let partition = partition_value::<T>(&document)?;
        self.container.delete(id, &partition).await?;
        debug!(container = T::CONTAINER, %id, "record deleted");
        Ok(())
    }

    async fn all(&self) -> Result<Vec<T>, RepositoryError> {
        self.container
            .read_all()
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }
}
