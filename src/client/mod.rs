//! Transport boundary to the RAG service.

mod http;

use crate::metrics::RawBenchmarkReport;
use crate::model::{BenchmarkRequest, Document, SearchQuery};
use async_trait::async_trait;

pub use http::HttpTransport;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Non-2xx response. `message` is the server-supplied error when there was one.
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Calls the orchestrator makes against the service, one per endpoint.
#[async_trait]
pub trait RagTransport: Send + Sync {
    /// `GET /rag/list`
    async fn list_documents(&self) -> Result<Vec<Document>, TransportError>;
    /// `POST /rag/clear`
    async fn clear_documents(&self) -> Result<(), TransportError>;
    /// `POST /rag/add`; the response carries no corpus, callers re-list.
    async fn add_document(&self, text: &str) -> Result<(), TransportError>;
    /// `POST /rag/search`
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, TransportError>;
    /// `POST /rag_metrics`, under the extended benchmark timeout.
    async fn run_benchmark(
        &self,
        request: &BenchmarkRequest,
    ) -> Result<RawBenchmarkReport, TransportError>;
}
