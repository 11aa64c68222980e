//! Benchmark telemetry normalization.
//!
//! The service's `/rag_metrics` payload is heterogeneous: most sections are always
//! present, `rag_impact` only appears when an LLM took part, and inside it either a
//! `skipped` reason or the comparison fields are filled in. Everything is decoded
//! into the all-optional [`RawBenchmarkReport`] first and then checked into a
//! [`BenchmarkMetrics`] that renderers can index without presence checks.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("benchmark response is missing `{0}`")]
    MissingField(&'static str),
    #[error("rag_impact carries both a skip reason and comparison fields")]
    AmbiguousRagImpact,
    /// The service answered 2xx but reported its own failure.
    #[error("{0}")]
    Reported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSize {
    pub index_mb: f64,
    pub metadata_mb: f64,
    pub total_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss_before_mb: f64,
    pub rss_after_mb: f64,
    pub delta_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VramUsage {
    #[serde(default)]
    pub device: Option<String>,
    pub allocated_mb: f64,
    pub reserved_mb: f64,
    pub peak_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    pub recall_at_3: f64,
    pub queries_evaluated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restoration {
    pub restore_time_s: f64,
    pub documents_restored: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPerformance {
    pub avg_query_time_ms: f64,
    /// Average latency per K value, in the order the service reported them.
    #[serde(with = "ordered_timings")]
    pub topk_avg_times_ms: Vec<(String, f64)>,
}

/// The quantitative with/without-RAG comparison produced by an LLM benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagComparison {
    pub query: String,
    pub contexts_used: u64,
    pub answer_length_diff: i64,
    pub answer_with_rag: String,
    pub answer_without_rag: String,
    pub inference_time_with_rag_s: f64,
    pub inference_time_without_rag_s: f64,
    pub rag_overhead_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RagImpact {
    Skipped { reason: String },
    Compared(RagComparison),
}

/// Validated benchmark record. Full precision is kept; rounding is a rendering concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub ok: bool,
    pub documents_indexed: u64,
    pub indexing_time_s: f64,
    pub index_size: IndexSize,
    pub memory: MemoryUsage,
    pub vram: VramUsage,
    pub relevance: Relevance,
    pub restoration: Restoration,
    pub retrieval_performance: RetrievalPerformance,
    /// `None` for a run without an LLM.
    pub rag_impact: Option<RagImpact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRagImpact {
    #[serde(default)]
    pub skipped: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub contexts_used: Option<u64>,
    #[serde(default)]
    pub answer_length_diff: Option<i64>,
    #[serde(default)]
    pub answer_with_rag: Option<String>,
    #[serde(default)]
    pub answer_without_rag: Option<String>,
    #[serde(default)]
    pub inference_time_with_rag_s: Option<f64>,
    #[serde(default)]
    pub inference_time_without_rag_s: Option<f64>,
    #[serde(default)]
    pub rag_overhead_s: Option<f64>,
}

/// The benchmark payload as decoded off the wire, before any presence checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBenchmarkReport {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub documents_indexed: Option<u64>,
    #[serde(default)]
    pub indexing_time_s: Option<f64>,
    #[serde(default)]
    pub index_size: Option<IndexSize>,
    #[serde(default)]
    pub memory: Option<MemoryUsage>,
    #[serde(default)]
    pub vram: Option<VramUsage>,
    #[serde(default)]
    pub relevance: Option<Relevance>,
    #[serde(default)]
    pub restoration: Option<Restoration>,
    #[serde(default)]
    pub retrieval_performance: Option<RetrievalPerformance>,
    #[serde(default)]
    pub rag_impact: Option<RawRagImpact>,
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, MetricsError> {
    value.ok_or(MetricsError::MissingField(name))
}

impl RawRagImpact {
    fn has_comparison_fields(&self) -> bool {
        self.query.is_some()
            || self.contexts_used.is_some()
            || self.answer_length_diff.is_some()
            || self.answer_with_rag.is_some()
            || self.answer_without_rag.is_some()
            || self.inference_time_with_rag_s.is_some()
            || self.inference_time_without_rag_s.is_some()
            || self.rag_overhead_s.is_some()
    }

    fn into_impact(self) -> Result<RagImpact, MetricsError> {
        if let Some(reason) = self.skipped.clone() {
            if self.has_comparison_fields() {
                return Err(MetricsError::AmbiguousRagImpact);
            }
            return Ok(RagImpact::Skipped { reason });
        }
        Ok(RagImpact::Compared(RagComparison {
            query: required(self.query, "rag_impact.query")?,
            contexts_used: required(self.contexts_used, "rag_impact.contexts_used")?,
            answer_length_diff: required(self.answer_length_diff, "rag_impact.answer_length_diff")?,
            answer_with_rag: required(self.answer_with_rag, "rag_impact.answer_with_rag")?,
            answer_without_rag: required(self.answer_without_rag, "rag_impact.answer_without_rag")?,
            inference_time_with_rag_s: required(
                self.inference_time_with_rag_s,
                "rag_impact.inference_time_with_rag_s",
            )?,
            inference_time_without_rag_s: required(
                self.inference_time_without_rag_s,
                "rag_impact.inference_time_without_rag_s",
            )?,
            rag_overhead_s: required(self.rag_overhead_s, "rag_impact.rag_overhead_s")?,
        }))
    }
}

/// Check a raw report into a [`BenchmarkMetrics`].
///
/// Any missing mandatory section fails the whole report; a partially valid report is
/// never returned.
pub fn normalize(raw: RawBenchmarkReport) -> Result<BenchmarkMetrics, MetricsError> {
    if let Some(message) = raw.error.filter(|m| !m.trim().is_empty()) {
        return Err(MetricsError::Reported(message));
    }
    Ok(BenchmarkMetrics {
        index_size: required(raw.index_size, "index_size")?,
        indexing_time_s: required(raw.indexing_time_s, "indexing_time_s")?,
        memory: required(raw.memory, "memory")?,
        relevance: required(raw.relevance, "relevance")?,
        restoration: required(raw.restoration, "restoration")?,
        retrieval_performance: required(raw.retrieval_performance, "retrieval_performance")?,
        vram: required(raw.vram, "vram")?,
        ok: required(raw.ok, "ok")?,
        documents_indexed: required(raw.documents_indexed, "documents_indexed")?,
        rag_impact: raw.rag_impact.map(RawRagImpact::into_impact).transpose()?,
    })
}

/// (De)serialize a JSON object of `K -> ms` as a list of pairs, keeping document order.
mod ordered_timings {
    use super::*;
    use serde::ser::SerializeMap;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(pairs: &[(String, f64)], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<(String, f64)>, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, f64)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of K values to millisecond timings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, f64>()? {
                    out.push((k, v));
                }
                Ok(out)
            }
        }

        d.deserialize_map(PairsVisitor)
    }
}
