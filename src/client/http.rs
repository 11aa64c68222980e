use super::{RagTransport, TransportError};
use crate::metrics::RawBenchmarkReport;
use crate::model::{
    AddDocumentRequest, BenchmarkRequest, ClientConfig, Document, DocumentList, SearchQuery,
    SearchResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Keys the service may use to carry a human-readable error, in lookup order.
const ERROR_KEYS: [&str; 3] = ["error", "detail", "message"];

/// reqwest-backed transport with a fixed base URL and a default request timeout.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    benchmark_timeout: Duration,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            benchmark_timeout: cfg.benchmark_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pull a server-supplied error message out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ERROR_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message =
        server_message(&body).unwrap_or_else(|| format!("request failed with status {status}"));
    Err(TransportError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Decode from the raw bytes so map key order is whatever the service sent.
async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl RagTransport for HttpTransport {
    async fn list_documents(&self) -> Result<Vec<Document>, TransportError> {
        let resp = self.http.get(self.url("/rag/list")).send().await?;
        let list: DocumentList = decode_json(check_status(resp).await?).await?;
        Ok(list.documents)
    }

    async fn clear_documents(&self) -> Result<(), TransportError> {
        let resp = self.http.post(self.url("/rag/clear")).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn add_document(&self, text: &str) -> Result<(), TransportError> {
        let body = AddDocumentRequest {
            text: text.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/rag/add"))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, TransportError> {
        let resp = self
            .http
            .post(self.url("/rag/search"))
            .json(query)
            .send()
            .await?;
        let found: SearchResponse = decode_json(check_status(resp).await?).await?;
        Ok(found.results)
    }

    async fn run_benchmark(
        &self,
        request: &BenchmarkRequest,
    ) -> Result<RawBenchmarkReport, TransportError> {
        let resp = self
            .http
            .post(self.url("/rag_metrics"))
            .timeout(self.benchmark_timeout)
            .json(request)
            .send()
            .await?;
        decode_json(check_status(resp).await?).await
    }
}
