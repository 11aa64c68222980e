//! Text summary builders for CLI output.
//!
//! State stores full-precision numbers; the fixed decimal places below are applied
//! only here, when lines are formatted for display.

use crate::metrics::{BenchmarkMetrics, RagImpact};
use crate::model::Document;
use crate::orchestrator::BusyState;
use crate::state::ActivityLog;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn secs(v: f64) -> String {
    format!("{v:.3} s")
}

fn millis(v: f64) -> String {
    format!("{v:.2} ms")
}

fn index_mb(v: f64) -> String {
    format!("{v:.4} MB")
}

fn mem_mb(v: f64) -> String {
    format!("{v:.2} MB")
}

fn ratio(v: f64) -> String {
    format!("{v:.3}")
}

/// Keep long document texts and answers on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}

pub(crate) fn build_corpus_summary(docs: &[Document]) -> TextSummary {
    let mut lines = vec![format!("Documents ({})", docs.len())];
    for doc in docs {
        lines.push(format!("  [{}] {}", doc.id, preview(&doc.text, 80)));
    }
    TextSummary { lines }
}

pub(crate) fn build_search_summary(results: &[String]) -> TextSummary {
    let mut lines = vec![format!("Results ({})", results.len())];
    for (i, r) in results.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, preview(r, 100)));
    }
    TextSummary { lines }
}

pub(crate) fn build_log_summary(log: &ActivityLog) -> TextSummary {
    let lines = log
        .entries()
        .iter()
        .map(|e| format!("{}  {}", e.timestamp_utc, e.message))
        .collect();
    TextSummary { lines }
}

pub(crate) fn build_status_line(busy: BusyState) -> String {
    let mut running = Vec::new();
    if busy.loading {
        running.push("loading");
    }
    if busy.clearing {
        running.push("clearing");
    }
    if busy.adding {
        running.push("adding");
    }
    if busy.searching {
        running.push("searching");
    }
    if busy.benchmarking {
        running.push("benchmarking");
    }
    if running.is_empty() {
        "Idle".to_string()
    } else {
        format!("Running: {}", running.join(", "))
    }
}

/// Metrics view. `None` renders as "no results", which is also what a running
/// benchmark looks like.
pub(crate) fn build_metrics_summary(metrics: Option<&BenchmarkMetrics>) -> TextSummary {
    let Some(m) = metrics else {
        return TextSummary {
            lines: vec!["No benchmark results".to_string()],
        };
    };

    let mut lines = vec![
        format!("Status: {}", if m.ok { "OK" } else { "FAILED" }),
        format!("Documents indexed: {}", m.documents_indexed),
        format!("Indexing time: {}", secs(m.indexing_time_s)),
        format!(
            "Index size: index {}, metadata {}, total {}",
            index_mb(m.index_size.index_mb),
            index_mb(m.index_size.metadata_mb),
            index_mb(m.index_size.total_mb)
        ),
        format!(
            "Memory: before {}, after {}, delta {}",
            mem_mb(m.memory.rss_before_mb),
            mem_mb(m.memory.rss_after_mb),
            mem_mb(m.memory.delta_mb)
        ),
        format!(
            "VRAM ({}): allocated {}, reserved {}, peak {}",
            m.vram.device.as_deref().unwrap_or("n/a"),
            mem_mb(m.vram.allocated_mb),
            mem_mb(m.vram.reserved_mb),
            mem_mb(m.vram.peak_mb)
        ),
        format!(
            "Recall@3: {} over {} queries",
            ratio(m.relevance.recall_at_3),
            m.relevance.queries_evaluated
        ),
        format!(
            "Restoration: {} documents in {}",
            m.restoration.documents_restored,
            secs(m.restoration.restore_time_s)
        ),
        format!(
            "Avg query time: {}",
            millis(m.retrieval_performance.avg_query_time_ms)
        ),
    ];

    for (k, ms) in &m.retrieval_performance.topk_avg_times_ms {
        lines.push(format!("  top_k={k}: {}", millis(*ms)));
    }

    match &m.rag_impact {
        None => {}
        Some(RagImpact::Skipped { reason }) => {
            lines.push(format!("RAG impact: skipped ({reason})"));
        }
        Some(RagImpact::Compared(c)) => {
            lines.push(format!("RAG impact for \"{}\"", preview(&c.query, 60)));
            lines.push(format!(
                "  contexts used {}, answer length diff {:+}",
                c.contexts_used, c.answer_length_diff
            ));
            lines.push(format!(
                "  inference with RAG {}, without {}, overhead {}",
                secs(c.inference_time_with_rag_s),
                secs(c.inference_time_without_rag_s),
                secs(c.rag_overhead_s)
            ));
            lines.push(format!("  with RAG: {}", preview(&c.answer_with_rag, 100)));
            lines.push(format!(
                "  without RAG: {}",
                preview(&c.answer_without_rag, 100)
            ));
        }
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        IndexSize, MemoryUsage, RagComparison, Relevance, Restoration, RetrievalPerformance,
        VramUsage,
    };

    fn metrics(rag_impact: Option<RagImpact>) -> BenchmarkMetrics {
        BenchmarkMetrics {
            ok: true,
            documents_indexed: 4,
            indexing_time_s: 2.0,
            index_size: IndexSize {
                index_mb: 0.125,
                metadata_mb: 0.0625,
                total_mb: 0.1875,
            },
            memory: MemoryUsage {
                rss_before_mb: 100.0,
                rss_after_mb: 102.5,
                delta_mb: 2.5,
            },
            vram: VramUsage {
                device: None,
                allocated_mb: 0.0,
                reserved_mb: 0.0,
                peak_mb: 0.0,
            },
            relevance: Relevance {
                recall_at_3: 0.75,
                queries_evaluated: 4,
            },
            restoration: Restoration {
                restore_time_s: 0.25,
                documents_restored: 4,
            },
            retrieval_performance: RetrievalPerformance {
                avg_query_time_ms: 1.5,
                topk_avg_times_ms: vec![("5".into(), 2.5), ("1".into(), 1.25)],
            },
            rag_impact,
        }
    }

    #[test]
    fn metrics_apply_field_precision() {
        let lines = build_metrics_summary(Some(&metrics(None))).lines;
        assert!(lines.contains(&"Indexing time: 2.000 s".to_string()));
        assert!(lines.contains(
            &"Index size: index 0.1250 MB, metadata 0.0625 MB, total 0.1875 MB".to_string()
        ));
        assert!(lines.contains(
            &"Memory: before 100.00 MB, after 102.50 MB, delta 2.50 MB".to_string()
        ));
        assert!(lines.contains(&"Recall@3: 0.750 over 4 queries".to_string()));
        assert!(lines.contains(&"Avg query time: 1.50 ms".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("RAG impact")));
    }

    #[test]
    fn topk_lines_follow_stored_order() {
        let lines = build_metrics_summary(Some(&metrics(None))).lines;
        let topk: Vec<_> = lines.iter().filter(|l| l.contains("top_k=")).collect();
        assert_eq!(topk, vec!["  top_k=5: 2.50 ms", "  top_k=1: 1.25 ms"]);
    }

    #[test]
    fn rag_impact_branches_render_exclusively() {
        let skipped = build_metrics_summary(Some(&metrics(Some(RagImpact::Skipped {
            reason: "model missing".into(),
        }))))
        .lines;
        assert!(skipped.contains(&"RAG impact: skipped (model missing)".to_string()));
        assert!(!skipped.iter().any(|l| l.contains("overhead")));

        let compared = build_metrics_summary(Some(&metrics(Some(RagImpact::Compared(
            RagComparison {
                query: "q".into(),
                contexts_used: 2,
                answer_length_diff: 12,
                answer_with_rag: "long\nanswer".into(),
                answer_without_rag: "short".into(),
                inference_time_with_rag_s: 1.5,
                inference_time_without_rag_s: 1.0,
                rag_overhead_s: 0.5,
            },
        )))))
        .lines;
        assert!(compared.contains(&"  contexts used 2, answer length diff +12".to_string()));
        assert!(compared.contains(
            &"  inference with RAG 1.500 s, without 1.000 s, overhead 0.500 s".to_string()
        ));
        assert!(compared.contains(&"  with RAG: long answer".to_string()));
        assert!(!compared.iter().any(|l| l.contains("skipped")));
    }

    #[test]
    fn absent_metrics_render_placeholder() {
        assert_eq!(
            build_metrics_summary(None).lines,
            vec!["No benchmark results".to_string()]
        );
    }

    #[test]
    fn corpus_and_results_previews() {
        let docs = vec![Document {
            id: "a1".into(),
            text: "x".repeat(200),
        }];
        let lines = build_corpus_summary(&docs).lines;
        assert_eq!(lines[0], "Documents (1)");
        assert!(lines[1].starts_with("  [a1] "));
        assert!(lines[1].ends_with('…'));

        let lines = build_search_summary(&["one".into(), "two".into()]).lines;
        assert_eq!(lines, vec!["Results (2)", "  1. one", "  2. two"]);
    }

    #[test]
    fn status_line_lists_running_kinds() {
        assert_eq!(build_status_line(BusyState::default()), "Idle");
        let busy = BusyState {
            searching: true,
            benchmarking: true,
            ..BusyState::default()
        };
        assert_eq!(build_status_line(busy), "Running: searching, benchmarking");
    }
}
