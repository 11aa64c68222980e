use crate::client::{HttpTransport, RagTransport};
use crate::model::{AddDocumentRequest, BenchmarkRequest, ClientConfig, OpOutcome, SearchQuery};
use crate::orchestrator::{self, Orchestrator};
use crate::text_summary::{self, TextSummary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
pub(crate) fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rag-bench-cli",
    version,
    about = "Manage a RAG document store, run similarity searches and benchmark retrieval"
)]
pub struct Cli {
    /// Base URL of the RAG service
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Timeout for list/add/clear/search requests
    #[arg(long, default_value = "10s")]
    pub timeout: humantime::Duration,

    /// Timeout for benchmark runs (indexing and LLM inference are slow)
    #[arg(long, default_value = "120s")]
    pub benchmark_timeout: humantime::Duration,

    /// Print the resulting view as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Export benchmark results as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List all indexed documents
    List,
    /// Add a document, then reload the corpus
    Add { text: String },
    /// Remove every document from the corpus
    Clear,
    /// Similarity search over the corpus
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 3)]
        top_k: u32,
        /// Minimum similarity score in [0, 1]
        #[arg(long, default_value_t = 0.35)]
        threshold: f64,
    },
    /// Run the retrieval benchmark, optionally measuring RAG impact on an LLM
    Benchmark {
        /// Compare answers of this LLM with and without retrieval
        #[arg(long)]
        llm: Option<String>,
    },
    /// Show recently saved benchmark runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Interactive mode (default)
    Shell,
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.clone(),
        timeout: Duration::from(args.timeout),
        benchmark_timeout: Duration::from(args.benchmark_timeout),
        ..ClientConfig::default()
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let transport = HttpTransport::new(&cfg).context("failed to build HTTP client")?;
    let orch = Orchestrator::new(transport);

    match args.command.clone().unwrap_or(Command::Shell) {
        Command::Shell => crate::shell::run(args, orch).await,
        Command::History { limit } => run_history(&args, limit),
        command => run_once(&args, &orch, command).await,
    }
}

/// Run a single operation, print the activity log to stderr and the view to stdout.
async fn run_once<T: RagTransport>(
    args: &Cli,
    orch: &Orchestrator<T>,
    command: Command,
) -> Result<()> {
    // Validate here so a rejected input gets a reason; the orchestrator ignores it silently.
    let outcome = match &command {
        Command::List => orch.refresh().await,
        Command::Add { text } => {
            AddDocumentRequest::new(text)?;
            orch.add(text).await
        }
        Command::Clear => orch.clear().await,
        Command::Search {
            query,
            top_k,
            threshold,
        } => {
            SearchQuery::new(query, *top_k, *threshold)?;
            orch.search(query, *top_k, *threshold).await
        }
        Command::Benchmark { llm } => {
            BenchmarkRequest::new(llm.is_some(), llm.as_deref())?;
            orch.benchmark(llm.is_some(), llm.as_deref()).await
        }
        Command::History { .. } | Command::Shell => {
            anyhow::bail!("not a single-shot command")
        }
    };

    let (out_tx, out_handle) = spawn_output_writer();
    let state = orch.snapshot().await;
    // A failure's own line becomes the returned error, so it is not echoed twice.
    let echoed = match outcome {
        OpOutcome::Failed => state.log.len().saturating_sub(1),
        _ => state.log.len(),
    };
    for entry in &state.log.entries()[..echoed] {
        let _ = out_tx.send(OutputLine::Stderr(entry.message.clone()));
    }

    if outcome.is_success() {
        let view = match &command {
            Command::Search { .. } => {
                if args.json {
                    serde_json::to_string_pretty(&state.search_results)?
                } else {
                    lines(text_summary::build_search_summary(&state.search_results))
                }
            }
            Command::Benchmark { llm } => {
                if let Some(metrics) = state.metrics.as_ref() {
                    let processed =
                        orchestrator::process_benchmark_completion(args, llm.as_deref(), metrics);
                    if let Some(path) = processed.auto_saved_path.as_ref() {
                        let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", path.display())));
                    }
                    for msg in processed.export_messages {
                        let _ = out_tx.send(OutputLine::Stderr(msg));
                    }
                    if args.json {
                        serde_json::to_string_pretty(&processed.run)?
                    } else {
                        lines(text_summary::build_metrics_summary(Some(metrics)))
                    }
                } else {
                    lines(text_summary::build_metrics_summary(None))
                }
            }
            _ => {
                if args.json {
                    serde_json::to_string_pretty(&state.docs)?
                } else {
                    lines(text_summary::build_corpus_summary(&state.docs))
                }
            }
        };
        let _ = out_tx.send(OutputLine::Stdout(view));
    }

    drop(out_tx);
    let _ = out_handle.await;

    match outcome {
        OpOutcome::Failed => {
            let last = state.log.messages().last().unwrap_or("operation failed");
            Err(anyhow::anyhow!("{last}"))
        }
        OpOutcome::Succeeded | OpOutcome::Skipped => Ok(()),
    }
}

fn run_history(args: &Cli, limit: usize) -> Result<()> {
    let runs = crate::storage::load_recent(limit).context("failed to load saved runs")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No saved benchmark runs");
    }
    for run in &runs {
        let llm = run.llm_name.as_deref().unwrap_or("-");
        println!(
            "{}  {}  llm={}  docs={}  indexing={:.3} s  recall@3={:.3}",
            run.timestamp_utc,
            run.base_url,
            llm,
            run.metrics.documents_indexed,
            run.metrics.indexing_time_s,
            run.metrics.relevance.recall_at_3
        );
    }
    Ok(())
}

fn lines(summary: TextSummary) -> String {
    summary.lines.join("\n")
}
