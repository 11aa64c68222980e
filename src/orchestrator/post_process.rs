//! Post-benchmark processing utilities.
//!
//! Handles auto-save and exports after a benchmark run has been normalized.

use crate::cli::Cli;
use crate::metrics::BenchmarkMetrics;
use crate::storage::{self, SavedRun};

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub run: SavedRun,
    pub export_messages: Vec<String>,
    pub auto_saved_path: Option<std::path::PathBuf>,
}

/// Wrap a finished run with its context, auto-save it and write any requested export.
/// Failures here are reported as messages; the run itself already succeeded.
pub(crate) fn process_benchmark_completion(
    args: &Cli,
    llm_name: Option<&str>,
    metrics: &BenchmarkMetrics,
) -> ProcessedRun {
    let run = SavedRun::new(&args.base_url, llm_name, metrics.clone());

    let mut export_messages = Vec::new();
    let auto_saved_path = if args.auto_save {
        match storage::save_run(&run) {
            Ok(path) => Some(path),
            Err(e) => {
                export_messages.push(format!("Auto-save failed: {e:#}"));
                None
            }
        }
    } else {
        None
    };

    if let Some(export_path) = args.export_json.as_deref() {
        match storage::export_json(export_path, &run) {
            Ok(()) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        run,
        export_messages,
        auto_saved_path,
    }
}
