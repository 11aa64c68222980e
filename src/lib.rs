pub mod cli;
pub mod client;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod state;
pub mod storage;

mod shell;
mod text_summary;
