//! In-memory container used by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use chatrelay_types::error::RepositoryError;
use serde_json::Value;

use super::container::DocumentContainer;
use super::filter::Filters;
use super::sanitize::needs_sanitizing;

#[derive(Default)]
pub(crate) struct MemoryContainer {
    docs: Mutex<Vec<(Value, Value)>>,
    /// Reject documents holding control characters, like a strict store.
    pub strict_encoding: bool,
    /// Reject every document with an encoding error.
    pub reject_all: bool,
    pub upserts: AtomicU32,
}

impl MemoryContainer {
    pub fn strict() -> Self {
        Self {
            strict_encoding: true,
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

impl DocumentContainer for MemoryContainer {
    async fn upsert(&self, partition_key: &Value, document: &Value) -> Result<Value, RepositoryError> {
        let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_all || (self.strict_encoding && needs_sanitizing(document)) {
            return Err(RepositoryError::Encoding("unsupported characters".to_string()));
        }

        let mut stored = document.clone();
        stored["_etag"] = Value::String(format!("\"{n:04}\""));
        stored["_ts"] = Value::from(1_700_000_000 + n as i64);

        let mut docs = self.docs.lock().unwrap();
        let id = &stored["id"];
        match docs.iter_mut().find(|(pk, doc)| pk == partition_key && &doc["id"] == id) {
            Some(slot) => slot.1 = stored.clone(),
            None => docs.push((partition_key.clone(), stored.clone())),
        }
        Ok(stored)
    }

    async fn query(&self, filters: &Filters) -> Result<Vec<Value>, RepositoryError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn delete(&self, id: &str, partition_key: &Value) -> Result<(), RepositoryError> {
        let mut docs = self.docs.lock().unwrap();
        let before = docs.len();
        docs.retain(|(pk, doc)| !(pk == partition_key && doc["id"] == id));
        if docs.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Value>, RepositoryError> {
        Ok(self.docs.lock().unwrap().iter().map(|(_, d)| d.clone()).collect())
    }
}
