//! Shapes returned by the document retrieval (search) service.

use serde::{Deserialize, Serialize};

/// One retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(rename = "metadata_spo_item_table_title", default)]
    pub table_title: Option<String>,
    #[serde(rename = "metadata_spo_item_path", default)]
    pub item_path: Option<String>,
    #[serde(default)]
    pub markdown_content: Option<String>,
    #[serde(rename = "metadata_spo_item_release_date", default)]
    pub release_date: Option<String>,
}

/// Retrieval response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "semantic_documents", default)]
    pub documents: Vec<SearchDocument>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// Parameters of one retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Optional thread filter forwarded to the search service.
    pub filter: Option<String>,
}
