//! HTTP client for the document search service.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use chatrelay_core::retrieval::ContextRetriever;
use chatrelay_types::error::RetrievalError;
use chatrelay_types::retrieval::{SearchQuery, SearchResult};

use crate::config::RetrievalSettings;

/// Calls `GET {endpoint}?q=..&code=..[&filter=..]`.
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    access_code: Option<SecretString>,
}

impl SearchClient {
    pub fn new(settings: &RetrievalSettings) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RetrievalError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            access_code: settings.access_code.clone(),
        })
    }
}

impl ContextRetriever for SearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, RetrievalError> {
        let mut params: Vec<(&str, &str)> = vec![("q", query.text.as_str())];
        if let Some(code) = &self.access_code {
            params.push(("code", code.expose_secret()));
        }
        if let Some(filter) = &query.filter {
            params.push(("filter", filter.as_str()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| RetrievalError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status(status.as_u16()));
        }

        let result: SearchResult = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;
        debug!(documents = result.documents.len(), "retrieved documents");
        Ok(result)
    }
}
