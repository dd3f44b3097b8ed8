//! Cosmos DB document container over the REST API.
//!
//! The database and container are created on first use (create-if-not-exists)
//! and the outcome is cached for the life of the process. A missing
//! container name is reported as a configuration error at that point, not at
//! startup.

use std::time::Duration;

use chatrelay_core::repository::{DocumentContainer, Filters};
use chatrelay_types::error::RepositoryError;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::auth::{authorization, format_date};
use crate::config::CosmosSettings;

/// REST API version sent in `x-ms-version`.
const API_VERSION: &str = "2018-12-31";

/// One Cosmos DB container holding JSON documents.
///
/// Intentionally not `Debug`: it holds the account key.
pub struct CosmosContainer {
    client: reqwest::Client,
    endpoint: String,
    key: SecretString,
    database: String,
    container: Option<String>,
    partition_path: String,
    ready: OnceCell<String>,
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

impl CosmosContainer {
    /// Build a handle. No network traffic happens until the first operation.
    ///
    /// `partition_key` is the record field the container is partitioned on,
    /// e.g. `session_id`.
    pub fn new(settings: &CosmosSettings, partition_key: &str) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RepositoryError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.uri.trim_end_matches('/').to_string(),
            key: settings.key.clone(),
            database: settings.database.clone(),
            container: settings.container.clone(),
            partition_path: format!("/{}", partition_key.replace("__", "/")),
            ready: OnceCell::new(),
        })
    }

    fn database_link(&self) -> String {
        format!("dbs/{}", self.database)
    }

    /// Signed request for `resource_link`, addressed at `path` under the endpoint.
    fn request(
        &self,
        method: Method,
        resource_type: &str,
        resource_link: &str,
        path: &str,
    ) -> Result<RequestBuilder, RepositoryError> {
        let date = format_date(Utc::now());
        let auth = authorization(
            self.key.expose_secret(),
            method.as_str(),
            resource_type,
            resource_link,
            &date,
        )
        .map_err(|e| RepositoryError::Configuration(e.to_string()))?;

        Ok(self
            .client
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("Authorization", auth)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("Accept", "application/json"))
    }

    /// Container link (`dbs/{db}/colls/{coll}`), creating both on first call.
    async fn collection_link(&self) -> Result<&str, RepositoryError> {
        self.ready
            .get_or_try_init(|| self.ensure_created())
            .await
            .map(String::as_str)
    }

    async fn ensure_created(&self) -> Result<String, RepositoryError> {
        let container = self.container.clone().ok_or_else(|| {
            RepositoryError::Configuration("AZURE_COSMOS_DB_CONTAINER is not set".to_string())
        })?;
        let database_link = self.database_link();

        let response = send(
            self.request(Method::POST, "dbs", "", "dbs")?
                .json(&json!({ "id": self.database })),
        )
        .await?;
        accept_created_or_conflict(response, "database").await?;

        let response = send(
            self.request(Method::POST, "colls", &database_link, &format!("{database_link}/colls"))?
                .json(&json!({
                    "id": container,
                    "partitionKey": { "paths": [self.partition_path], "kind": "Hash" }
                })),
        )
        .await?;
        accept_created_or_conflict(response, "container").await?;

        info!(database = %self.database, %container, "document container ready");
        Ok(format!("{database_link}/colls/{container}"))
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

async fn send(request: RequestBuilder) -> Result<Response, RepositoryError> {
    request
        .send()
        .await
        .map_err(|e| RepositoryError::Connection(format!("HTTP request failed: {e}")))
}

fn partition_header(partition_key: &Value) -> String {
    json!([partition_key]).to_string()
}

/// Map a non-success response to the repository taxonomy.
async fn status_error(response: Response) -> RepositoryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let lowered = body.to_lowercase();

    match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound,
        StatusCode::CONFLICT => RepositoryError::Conflict(body),
        StatusCode::BAD_REQUEST
            if lowered.contains("encod")
                || lowered.contains("invalid character")
                || lowered.contains("unsupported unicode") =>
        {
            RepositoryError::Encoding(body)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RepositoryError::Connection(format!("HTTP {status}: {body}"))
        }
        _ => RepositoryError::Query(format!("HTTP {status}: {body}")),
    }
}

async fn accept_created_or_conflict(response: Response, what: &str) -> Result<(), RepositoryError> {
    let status = response.status();
    if status.is_success() {
        debug!(what, "created");
        return Ok(());
    }
    if status == StatusCode::CONFLICT {
        debug!(what, "already exists");
        return Ok(());
    }
    Err(status_error(response).await)
}

async fn json_body<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, RepositoryError> {
    response
        .json()
        .await
        .map_err(|e| RepositoryError::Serialization(format!("invalid response body: {e}")))
}

impl DocumentContainer for CosmosContainer {
    async fn upsert(&self, partition_key: &Value, document: &Value) -> Result<Value, RepositoryError> {
        let link = self.collection_link().await?;

        let response = send(
            self.request(Method::POST, "docs", link, &format!("{link}/docs"))?
                .header("x-ms-documentdb-is-upsert", "True")
                .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
                .json(document),
        )
        .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        json_body(response).await
    }

    async fn query(&self, filters: &Filters) -> Result<Vec<Value>, RepositoryError> {
        let link = self.collection_link().await?;
        let body = json!({ "query": filters.to_sql(), "parameters": [] });

        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .request(Method::POST, "docs", link, &format!("{link}/docs"))?
                .header("Content-Type", "application/query+json")
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-documentdb-query-enablecrosspartition", "True")
                .body(body.to_string());
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token.as_str());
            }

            let response = send(request).await?;
            if !response.status().is_success() {
                return Err(status_error(response).await);
            }

            continuation = response
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let page: QueryPage = json_body(response).await?;
            documents.extend(page.documents);

            if continuation.is_none() {
                break;
            }
        }

        debug!(count = documents.len(), "query returned documents");
        Ok(documents)
    }

    async fn delete(&self, id: &str, partition_key: &Value) -> Result<(), RepositoryError> {
        let link = self.collection_link().await?;
        let doc_link = format!("{link}/docs/{id}");

        let response = send(
            self.request(Method::DELETE, "docs", &doc_link, &doc_link)?
                .header("x-ms-documentdb-partitionkey", partition_header(partition_key)),
        )
        .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Value>, RepositoryError> {
        self.query(&Filters::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::repository::{DocumentRepository, Repository};
    use chatrelay_types::chat::Conversation;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "dGVzdC1tYXN0ZXIta2V5LWZvci1zaWduaW5nLXJlcXVlc3Rz";

    fn settings(server: &MockServer, container: Option<&str>) -> CosmosSettings {
        CosmosSettings {
            uri: format!("{}/", server.uri()),
            key: SecretString::from(KEY),
            database: "chat".to_string(),
            container: container.map(str::to_string),
        }
    }

    async fn mount_setup(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/dbs"))
            .and(body_partial_json(json!({"id": "chat"})))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls"))
            .and(body_partial_json(json!({
                "id": "messages",
                "partitionKey": {"paths": ["/session_id"], "kind": "Hash"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "messages"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_missing_container_is_configuration_error_on_first_use() {
        let server = MockServer::start().await;
        let container = CosmosContainer::new(&settings(&server, None), "session_id").unwrap();

        let err = container.read_all().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Configuration(ref m) if m.contains("AZURE_COSMOS_DB_CONTAINER")));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_sends_signed_request_and_creates_once() {
        let server = MockServer::start().await;
        mount_setup(&server).await;
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls/messages/docs"))
            .and(header("x-ms-documentdb-is-upsert", "True"))
            .and(header("x-ms-documentdb-partitionkey", r#"["thread_1"]"#))
            .and(header("x-ms-version", API_VERSION))
            .and(header_exists("x-ms-date"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "d1",
                "session_id": "thread_1",
                "_etag": "\"00000001\"",
                "_ts": 1700000000
            })))
            .expect(2)
            .mount(&server)
            .await;

        let container = CosmosContainer::new(&settings(&server, Some("messages")), "session_id").unwrap();
        let doc = json!({"id": "d1", "session_id": "thread_1"});
        let stored = container.upsert(&json!("thread_1"), &doc).await.unwrap();
        assert_eq!(stored["_etag"], "\"00000001\"");
        container.upsert(&json!("thread_1"), &doc).await.unwrap();

        let auth = server.received_requests().await.unwrap()[2]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(auth.starts_with("type%3Dmaster%26ver%3D1%2E0%26sig%3D"));
    }

    #[tokio::test]
    async fn test_encoding_rejection_maps_to_encoding_error() {
        let server = MockServer::start().await;
        mount_setup(&server).await;
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls/messages/docs"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"code":"BadRequest","message":"The input content is invalid because of unsupported Unicode characters."}"#),
            )
            .mount(&server)
            .await;

        let container = CosmosContainer::new(&settings(&server, Some("messages")), "session_id").unwrap();
        let err = container
            .upsert(&json!("t"), &json!({"id": "x", "session_id": "t"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_query_follows_continuation() {
        let server = MockServer::start().await;
        mount_setup(&server).await;
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls/messages/docs"))
            .and(header("x-ms-documentdb-isquery", "True"))
            .and(header("x-ms-continuation", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Documents": [{"id": "b", "session_id": "t1"}],
                "_count": 1
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls/messages/docs"))
            .and(header("x-ms-documentdb-isquery", "True"))
            .and(body_partial_json(json!({
                "query": "SELECT * FROM c WHERE c.session_id = \"t1\""
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-ms-continuation", "page-2")
                    .set_body_json(json!({
                        "Documents": [{"id": "a", "session_id": "t1"}],
                        "_count": 1
                    })),
            )
            .with_priority(2)
            .mount(&server)
            .await;

        let container = CosmosContainer::new(&settings(&server, Some("messages")), "session_id").unwrap();
        let docs = container
            .query(&Filters::new().eq("session_id", "t1"))
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let server = MockServer::start().await;
        mount_setup(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/dbs/chat/colls/messages/docs/missing"))
            .and(header("x-ms-documentdb-partitionkey", r#"["t1"]"#))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let container = CosmosContainer::new(&settings(&server, Some("messages")), "session_id").unwrap();
        let err = container.delete("missing", &json!("t1")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_repository_get_ambiguous_over_cosmos() {
        let server = MockServer::start().await;
        mount_setup(&server).await;
        let doc = |id: &str| {
            json!({
                "id": id,
                "session_id": "t1",
                "request": {"turn": "user", "channel": "Teams", "message": "hi", "datetime": "2024-05-01T10:00:00Z"}
            })
        };
        Mock::given(method("POST"))
            .and(path("/dbs/chat/colls/messages/docs"))
            .and(header("x-ms-documentdb-isquery", "True"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"Documents": [doc("a"), doc("b")], "_count": 2})),
            )
            .mount(&server)
            .await;

        let repo: DocumentRepository<_, Conversation> = DocumentRepository::new(
            CosmosContainer::new(&settings(&server, Some("messages")), "session_id").unwrap(),
        );
        let err = repo
            .get(&Filters::new().eq("session_id", "t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Ambiguous(2)));

        let all = repo.query(&Filters::new().eq("session_id", "t1")).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
