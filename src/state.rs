//! Corpus state store.
//!
//! A plain container for what the presentation layer renders: the corpus snapshot,
//! the last search results, the last benchmark metrics and the activity log. It does
//! no I/O; the orchestrator is the only writer.

use crate::metrics::BenchmarkMetrics;
use crate::model::Document;
use serde::Serialize;

/// One human-readable line in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp_utc: String,
    pub message: String,
}

/// Append-only diagnostic trail of completed operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, message: impl Into<String>) {
        let timestamp_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());
        self.entries.push(LogEntry {
            timestamp_utc,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which request produced the current `docs`, and when it was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocsProvenance {
    /// Ticket handed out when the producing call started.
    pub request_seq: u64,
    /// Position of the producing call in completion order.
    pub completion_seq: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusState {
    pub docs: Vec<Document>,
    pub search_results: Vec<String>,
    /// Absent before the first benchmark and while one is running.
    pub metrics: Option<BenchmarkMetrics>,
    pub log: ActivityLog,
    pub docs_provenance: DocsProvenance,
}

impl CorpusState {
    /// Replace the corpus view with a complete snapshot.
    pub fn replace_docs(&mut self, docs: Vec<Document>, provenance: DocsProvenance) {
        self.docs = docs;
        self.docs_provenance = provenance;
    }
}
