use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for list/add/clear/search calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Benchmarks index the corpus and may run LLM inference, so they get a longer budget.
pub const DEFAULT_BENCHMARK_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub benchmark_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            timeout: DEFAULT_TIMEOUT,
            benchmark_timeout: DEFAULT_BENCHMARK_TIMEOUT,
            user_agent: format!("rag-bench-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A corpus document. The id is assigned by the server and opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDocumentRequest {
    pub text: String,
}

impl AddDocumentRequest {
    /// Blank text never reaches the service. The text is sent as typed.
    pub fn new(text: &str) -> Result<Self, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        Ok(Self {
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub top_k: u32,
    pub similarity_threshold: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("top_k must be at least 1, got {0}")]
    TopKOutOfRange(u32),
    #[error("similarity threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("document text is empty")]
    EmptyText,
    #[error("an LLM name is required when benchmarking with an LLM")]
    MissingLlmName,
}

impl SearchQuery {
    /// Build a query after applying the client-side range guards.
    /// The server stays authoritative; this only keeps obviously bad requests off the wire.
    /// Trimming only decides emptiness; the query is sent as typed.
    pub fn new(
        query: &str,
        top_k: u32,
        similarity_threshold: f64,
    ) -> Result<Self, ValidationError> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if top_k < 1 {
            return Err(ValidationError::TopKOutOfRange(top_k));
        }
        // NaN fails the range check too.
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(ValidationError::ThresholdOutOfRange(similarity_threshold));
        }
        Ok(Self {
            query: query.to_string(),
            top_k,
            similarity_threshold,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<String>,
}

/// Body for `POST /rag_metrics`: `{}` without an LLM, `{ "llm_name": .. }` with one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_name: Option<String>,
}

impl BenchmarkRequest {
    pub fn new(with_llm: bool, llm_name: Option<&str>) -> Result<Self, ValidationError> {
        if !with_llm {
            return Ok(Self::default());
        }
        match llm_name.map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Self {
                llm_name: Some(name.to_string()),
            }),
            _ => Err(ValidationError::MissingLlmName),
        }
    }
}

/// Operation kinds the orchestrator sequences and tracks busy state for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Refresh,
    Clear,
    Add,
    Search,
    Benchmark,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Refresh => "refresh",
            OpKind::Clear => "clear",
            OpKind::Add => "add",
            OpKind::Search => "search",
            OpKind::Benchmark => "benchmark",
        }
    }
}

/// What happened to a user-triggered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// A client-side precondition failed; nothing was sent and nothing was logged.
    Skipped,
    Succeeded,
    /// The operation failed and was recorded in the activity log.
    Failed,
}

impl OpOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, OpOutcome::Succeeded)
    }
}
