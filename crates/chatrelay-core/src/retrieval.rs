//! Prompt enrichment from retrieved documents.
//!
//! `ContextRetriever` is the port to the search service. Retrieval is best
//! effort: callers treat any error as "no context" and send the plain message.

use chatrelay_types::error::RetrievalError;
use chatrelay_types::retrieval::{SearchDocument, SearchQuery, SearchResult};

/// Document search used to build prompt context.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ContextRetriever: Send + Sync {
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl std::future::Future<Output = Result<SearchResult, RetrievalError>> + Send;
}

fn format_document(doc: &SearchDocument) -> String {
    format!(
        "Table title: {}\nDocument link: {}\n\nMarkdown:\n{}\n\nReport date: {}\n\n",
        doc.table_title.as_deref().unwrap_or_default(),
        doc.item_path.as_deref().unwrap_or_default(),
        doc.markdown_content.as_deref().unwrap_or_default(),
        doc.release_date.as_deref().unwrap_or_default(),
    )
}

/// Render retrieved documents as one context block, or `None` when there
/// are no documents.
pub fn format_context(result: &SearchResult) -> Option<String> {
    if result.documents.is_empty() {
        return None;
    }
    let blocks: Vec<String> = result.documents.iter().map(format_document).collect();
    Some(blocks.join("\n\n"))
}

/// The prompt sent to the agent when context is available.
pub fn enrich_prompt(message: &str, context: &str) -> String {
    format!("Question:\n{message}\n\nContext:\n{context}")
}
