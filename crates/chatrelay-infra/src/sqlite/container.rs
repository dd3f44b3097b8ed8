//! SQLite document container.
//!
//! Implements `DocumentContainer` from `chatrelay-core` over the `documents`
//! table: one row per (container, partition value, id) with the JSON body as
//! text. Equality filters run through `json_extract`. The store metadata a
//! hosted document database would assign (`_etag`, `_rid`, `_self`, `_ts`)
//! is synthesized on every write.

use chatrelay_core::repository::{DocumentContainer, Filters};
use chatrelay_types::error::RepositoryError;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DocumentContainer`.
#[derive(Clone)]
pub struct SqliteContainer {
    pool: DatabasePool,
    container: String,
}

impl SqliteContainer {
    pub fn new(pool: DatabasePool, container: impl Into<String>) -> Self {
        Self {
            pool,
            container: container.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_body(row: &sqlx::sqlite::SqliteRow) -> Result<Value, RepositoryError> {
    let body: String = row.try_get("body").map_err(query_error)?;
    serde_json::from_str(&body)
        .map_err(|e| RepositoryError::Serialization(format!("invalid stored document: {e}")))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// SQLite JSON path for nested field segments, e.g. `$.request.channel`.
fn json_path(segments: &[&str]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        path.push('.');
        if is_identifier(segment) {
            path.push_str(segment);
        } else {
            path.push('"');
            path.push_str(&segment.replace('"', "\\\""));
            path.push('"');
        }
    }
    path
}

impl DocumentContainer for SqliteContainer {
    async fn upsert(&self, partition_key: &Value, document: &Value) -> Result<Value, RepositoryError> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RepositoryError::Serialization("document has no id".to_string()))?
            .to_string();
        let partition = partition_key.to_string();
        let etag = format!("\"{}\"", Uuid::now_v7().simple());
        let ts = Utc::now().timestamp();

        let mut stored = document.clone();
        if let Some(map) = stored.as_object_mut() {
            map.insert("_rid".to_string(), Value::String(id.clone()));
            map.insert(
                "_self".to_string(),
                Value::String(format!("dbs/local/colls/{}/docs/{id}", self.container)),
            );
            map.insert("_etag".to_string(), Value::String(etag.clone()));
            map.insert("_attachments".to_string(), Value::String("attachments/".to_string()));
            map.insert("_ts".to_string(), Value::from(ts));
        }
        let body = serde_json::to_string(&stored)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO documents (container, partition_key, id, body, etag, ts)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (container, partition_key, id)
               DO UPDATE SET body = excluded.body, etag = excluded.etag, ts = excluded.ts"#,
        )
        .bind(&self.container)
        .bind(&partition)
        .bind(&id)
        .bind(&body)
        .bind(&etag)
        .bind(ts)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(stored)
    }

    async fn query(&self, filters: &Filters) -> Result<Vec<Value>, RepositoryError> {
        let mut sql = String::from("SELECT body FROM documents WHERE container = ?");
        let mut binds: Vec<String> = Vec::new();
        for (path, value) in filters.conditions() {
            sql.push_str(" AND json_extract(body, ?) IS json_extract(?, '$')");
            binds.push(json_path(&path));
            binds.push(value.to_string());
        }
        sql.push_str(" ORDER BY ts, rowid");

        let mut query = sqlx::query(&sql).bind(&self.container);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(parse_body).collect()
    }

    async fn delete(&self, id: &str, partition_key: &Value) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE container = ? AND partition_key = ? AND id = ?",
        )
        .bind(&self.container)
        .bind(partition_key.to_string())
        .bind(id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Value>, RepositoryError> {
        let rows = sqlx::query("SELECT body FROM documents WHERE container = ? ORDER BY ts, rowid")
            .bind(&self.container)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(parse_body).collect()
    }
}
