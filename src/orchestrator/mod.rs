//! Application-level orchestration.
//!
//! This module owns the user-triggered operations against the RAG service (list,
//! add, clear, search, benchmark), their busy flags and result sequencing, plus
//! post-benchmark processing such as auto-save and exports. Presentation layers call
//! into this module and only read the resulting state.

mod busy;
mod controller;
mod post_process;

pub use controller::{BusyState, Orchestrator};
pub(crate) use post_process::process_benchmark_completion;
