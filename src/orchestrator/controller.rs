//! Operation controller.
//!
//! One async method per user action. Each method takes its busy flag for the whole
//! call, suspends only on the transport round-trip, and reconciles the outcome into
//! the shared [`CorpusState`]. Failures are recorded in the activity log and never
//! returned to the caller.

use super::busy::{BusyFlag, Sequencer};
use crate::client::RagTransport;
use crate::metrics;
use crate::model::{AddDocumentRequest, BenchmarkRequest, OpKind, OpOutcome, SearchQuery};
use crate::state::CorpusState;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Busy flags as seen by a presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyState {
    pub loading: bool,
    pub clearing: bool,
    pub adding: bool,
    pub searching: bool,
    pub benchmarking: bool,
}

pub struct Orchestrator<T> {
    transport: T,
    state: RwLock<CorpusState>,
    loading: BusyFlag,
    clearing: BusyFlag,
    adding: BusyFlag,
    searching: BusyFlag,
    benchmarking: BusyFlag,
    /// Shared by every call that writes `docs`: refresh, clear and add's reload.
    docs_seq: Sequencer,
    benchmark_seq: Sequencer,
}

impl<T: RagTransport> Orchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: RwLock::new(CorpusState::default()),
            loading: BusyFlag::default(),
            clearing: BusyFlag::default(),
            adding: BusyFlag::default(),
            searching: BusyFlag::default(),
            benchmarking: BusyFlag::default(),
            docs_seq: Sequencer::default(),
            benchmark_seq: Sequencer::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Borrow the current state for rendering. Do not hold the guard across awaits.
    pub async fn state(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read().await
    }

    pub async fn snapshot(&self) -> CorpusState {
        self.state.read().await.clone()
    }

    pub fn is_busy(&self, kind: OpKind) -> bool {
        match kind {
            OpKind::Refresh => self.loading.is_set(),
            OpKind::Clear => self.clearing.is_set(),
            OpKind::Add => self.adding.is_set(),
            OpKind::Search => self.searching.is_set(),
            OpKind::Benchmark => self.benchmarking.is_set(),
        }
    }

    pub fn busy(&self) -> BusyState {
        BusyState {
            loading: self.loading.is_set(),
            clearing: self.clearing.is_set(),
            adding: self.adding.is_set(),
            searching: self.searching.is_set(),
            benchmarking: self.benchmarking.is_set(),
        }
    }

    /// Fetch the full document list and replace the corpus view with it.
    ///
    /// Overlapping refreshes all complete; whichever finishes last decides `docs`.
    pub async fn refresh(&self) -> OpOutcome {
        let _busy = self.loading.acquire();
        let ticket = self.docs_seq.begin();
        debug!(seq = ticket.seq, "listing documents");

        match self.transport.list_documents().await {
            Ok(docs) => {
                let mut state = self.state.write().await;
                let count = docs.len();
                let provenance = self.docs_seq.complete(ticket);
                state.replace_docs(docs, provenance);
                record(
                    &mut state,
                    OpKind::Refresh,
                    format!("Loaded {count} documents"),
                );
                OpOutcome::Succeeded
            }
            Err(e) => {
                self.record_failure(OpKind::Refresh, format!("Failed to load: {e}"))
                    .await
            }
        }
    }

    /// Wipe the corpus on the service. On failure the local view is left as it was,
    /// even though the service may have cleared part of it.
    pub async fn clear(&self) -> OpOutcome {
        let _busy = self.clearing.acquire();
        let ticket = self.docs_seq.begin();

        match self.transport.clear_documents().await {
            Ok(()) => {
                let mut state = self.state.write().await;
                let provenance = self.docs_seq.complete(ticket);
                state.replace_docs(Vec::new(), provenance);
                record(&mut state, OpKind::Clear, "Cleared documents".to_string());
                OpOutcome::Succeeded
            }
            Err(e) => {
                self.record_failure(OpKind::Clear, format!("Failed to clear: {e}"))
                    .await
            }
        }
    }

    /// Add a document, then reload the corpus since the add response carries none.
    ///
    /// Blank text is ignored. The caller keeps its input on anything but `Succeeded`.
    pub async fn add(&self, text: &str) -> OpOutcome {
        let request = match AddDocumentRequest::new(text) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "add rejected before sending");
                return OpOutcome::Skipped;
            }
        };

        {
            let _busy = self.adding.acquire();
            if let Err(e) = self.transport.add_document(&request.text).await {
                return self
                    .record_failure(OpKind::Add, format!("Failed to add: {e}"))
                    .await;
            }
            let mut state = self.state.write().await;
            record(&mut state, OpKind::Add, "Added document".to_string());
        }

        // The reload logs its own outcome; the add itself already succeeded.
        self.refresh().await;
        OpOutcome::Succeeded
    }

    /// Run a similarity search. Out-of-range parameters and blank queries never reach
    /// the service.
    pub async fn search(&self, query: &str, top_k: u32, similarity_threshold: f64) -> OpOutcome {
        let query = match SearchQuery::new(query, top_k, similarity_threshold) {
            Ok(q) => q,
            Err(e) => {
                debug!(error = %e, "search rejected before sending");
                return OpOutcome::Skipped;
            }
        };

        let _busy = self.searching.acquire();
        match self.transport.search(&query).await {
            Ok(results) => {
                let mut state = self.state.write().await;
                let count = results.len();
                state.search_results = results;
                record(
                    &mut state,
                    OpKind::Search,
                    format!(
                        "Search found {count} results (top_k={}, threshold={})",
                        query.top_k, query.similarity_threshold
                    ),
                );
                OpOutcome::Succeeded
            }
            Err(e) => {
                self.record_failure(OpKind::Search, format!("Search failed: {e}"))
                    .await
            }
        }
    }

    /// Run a benchmark, optionally comparing answers of the named LLM with and
    /// without retrieval.
    ///
    /// Current metrics are dropped before the request goes out and stay absent while
    /// any benchmark is in flight. Overlapping runs all complete; only the one that
    /// finishes last stores its metrics.
    pub async fn benchmark(&self, with_llm: bool, llm_name: Option<&str>) -> OpOutcome {
        let request = match BenchmarkRequest::new(with_llm, llm_name) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "benchmark rejected before sending");
                return OpOutcome::Skipped;
            }
        };

        let _busy = self.benchmarking.acquire();
        let ticket = self.benchmark_seq.begin();
        self.state.write().await.metrics = None;
        info!(seq = ticket.seq, llm = ?request.llm_name, "starting benchmark");

        let raw = match self.transport.run_benchmark(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                return self
                    .record_failure(OpKind::Benchmark, format!("Benchmark failed: {e}"))
                    .await
            }
        };
        let normalized = match metrics::normalize(raw) {
            Ok(m) => m,
            Err(e) => {
                return self
                    .record_failure(OpKind::Benchmark, format!("Benchmark failed: {e}"))
                    .await
            }
        };

        let mut state = self.state.write().await;
        let stamp = self.benchmark_seq.complete(ticket);
        debug!(
            request_seq = stamp.request_seq,
            completion_seq = stamp.completion_seq,
            "applying benchmark result"
        );
        let summary = format!(
            "Benchmark completed: {} documents indexed in {:.3}s",
            normalized.documents_indexed, normalized.indexing_time_s
        );
        // Our own guard counts as one; any more means a run is still going.
        if self.benchmarking.in_flight() == 1 {
            state.metrics = Some(normalized);
            record(&mut state, OpKind::Benchmark, summary);
        } else {
            record(
                &mut state,
                OpKind::Benchmark,
                format!("{summary} (another run still in progress, not shown)"),
            );
        }
        OpOutcome::Succeeded
    }

    async fn record_failure(&self, kind: OpKind, message: String) -> OpOutcome {
        warn!(op = kind.as_str(), "{message}");
        self.state.write().await.log.push(message);
        OpOutcome::Failed
    }
}

fn record(state: &mut CorpusState, kind: OpKind, message: String) {
    info!(op = kind.as_str(), "{message}");
    state.log.push(message);
}
