//! Interactive mode.
//!
//! Reads commands from stdin and runs each operation as its own task, so a search can
//! proceed while a benchmark is still running. A command whose operation kind is
//! already busy is refused, which is the text-mode equivalent of a disabled button.
//! New activity log lines are echoed on a timer.

use crate::cli::{spawn_output_writer, Cli, OutputLine};
use crate::client::RagTransport;
use crate::model::{OpKind, OpOutcome};
use crate::orchestrator::{self, Orchestrator};
use crate::text_summary;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::Duration;

const HELP: &[&str] = &[
    "Commands:",
    "  list                 reload the document list",
    "  add <text>           add a document",
    "  retry                resend the last add that failed",
    "  clear                remove every document",
    "  search <query>       similarity search with the current top_k/threshold",
    "  set top_k <n>        results per search (>= 1)",
    "  set threshold <t>    similarity threshold in [0, 1]",
    "  bench [llm_name]     run the benchmark, with an LLM comparison if named",
    "  docs | results | metrics | log | status",
    "  help | quit",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShellCommand {
    List,
    Add(String),
    Retry,
    Clear,
    Search(String),
    SetTopK(u32),
    SetThreshold(f64),
    Benchmark(Option<String>),
    Docs,
    Results,
    Metrics,
    Log,
    Status,
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    fn op_kind(&self) -> Option<OpKind> {
        match self {
            ShellCommand::List => Some(OpKind::Refresh),
            ShellCommand::Add(_) | ShellCommand::Retry => Some(OpKind::Add),
            ShellCommand::Clear => Some(OpKind::Clear),
            ShellCommand::Search(_) => Some(OpKind::Search),
            ShellCommand::Benchmark(_) => Some(OpKind::Benchmark),
            _ => None,
        }
    }
}

pub(crate) fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };
    let cmd = match head {
        "" => ShellCommand::Empty,
        "list" | "refresh" => ShellCommand::List,
        "add" => ShellCommand::Add(rest.to_string()),
        "retry" => ShellCommand::Retry,
        "clear" => ShellCommand::Clear,
        "search" => ShellCommand::Search(rest.to_string()),
        "bench" | "benchmark" => {
            ShellCommand::Benchmark((!rest.is_empty()).then(|| rest.to_string()))
        }
        "set" => {
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: set top_k <n> | set threshold <t>".to_string())?;
            match key {
                "top_k" => ShellCommand::SetTopK(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| format!("invalid top_k: {e}"))?,
                ),
                "threshold" => ShellCommand::SetThreshold(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| format!("invalid threshold: {e}"))?,
                ),
                other => return Err(format!("unknown setting: {other}")),
            }
        }
        "docs" => ShellCommand::Docs,
        "results" => ShellCommand::Results,
        "metrics" => ShellCommand::Metrics,
        "log" => ShellCommand::Log,
        "status" => ShellCommand::Status,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(cmd)
}

/// Search parameters kept between commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SearchSettings {
    pub top_k: u32,
    pub threshold: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.35,
        }
    }
}

struct Shell<T> {
    args: Cli,
    orch: Arc<Orchestrator<T>>,
    out: UnboundedSender<OutputLine>,
    settings: SearchSettings,
    /// Text of the last add that failed, kept for `retry`.
    draft: Arc<Mutex<Option<String>>>,
    log_cursor: usize,
}

impl<T: RagTransport + 'static> Shell<T> {
    fn say(&self, line: impl Into<String>) {
        let _ = self.out.send(OutputLine::Stdout(line.into()));
    }

    fn say_lines(&self, lines: Vec<String>) {
        for line in lines {
            self.say(line);
        }
    }

    /// Echo activity log lines appended since the last flush.
    async fn flush_log(&mut self) {
        let state = self.orch.state().await;
        for entry in state.log.entries().iter().skip(self.log_cursor) {
            let _ = self.out.send(OutputLine::Stderr(format!("> {}", entry.message)));
        }
        self.log_cursor = state.log.len();
    }

    /// Handle one command. Returns false when the shell should exit.
    async fn dispatch(&mut self, cmd: ShellCommand) -> bool {
        let starts_op = match cmd.op_kind() {
            Some(kind) if self.orch.is_busy(kind) => {
                self.say(format!("{} already in progress", kind.as_str()));
                return true;
            }
            Some(_) => true,
            None => false,
        };

        match cmd {
            ShellCommand::Empty => {}
            ShellCommand::Quit => return false,
            ShellCommand::Help => self.say_lines(HELP.iter().map(|s| s.to_string()).collect()),
            ShellCommand::List => {
                let orch = self.orch.clone();
                tokio::spawn(async move {
                    orch.refresh().await;
                });
            }
            ShellCommand::Add(text) => self.spawn_add(text),
            ShellCommand::Retry => {
                let draft = self.draft.lock().await.clone();
                match draft {
                    Some(text) => self.spawn_add(text),
                    None => self.say("nothing to retry"),
                }
            }
            ShellCommand::Clear => {
                let orch = self.orch.clone();
                tokio::spawn(async move {
                    orch.clear().await;
                });
            }
            ShellCommand::Search(query) => {
                let orch = self.orch.clone();
                let SearchSettings { top_k, threshold } = self.settings;
                tokio::spawn(async move {
                    orch.search(&query, top_k, threshold).await;
                });
            }
            ShellCommand::SetTopK(k) => {
                if k >= 1 {
                    self.settings.top_k = k;
                } else {
                    self.say("top_k must be at least 1");
                }
            }
            ShellCommand::SetThreshold(t) => {
                if (0.0..=1.0).contains(&t) {
                    self.settings.threshold = t;
                } else {
                    self.say("threshold must be within [0, 1]");
                }
            }
            ShellCommand::Benchmark(llm) => self.spawn_benchmark(llm),
            ShellCommand::Docs => {
                let state = self.orch.state().await;
                self.say_lines(text_summary::build_corpus_summary(&state.docs).lines);
            }
            ShellCommand::Results => {
                let state = self.orch.state().await;
                self.say_lines(text_summary::build_search_summary(&state.search_results).lines);
            }
            ShellCommand::Metrics => {
                if self.orch.is_busy(OpKind::Benchmark) {
                    self.say("Benchmark in progress…");
                } else {
                    let state = self.orch.state().await;
                    self.say_lines(text_summary::build_metrics_summary(state.metrics.as_ref()).lines);
                }
            }
            ShellCommand::Log => {
                let state = self.orch.state().await;
                self.say_lines(text_summary::build_log_summary(&state.log).lines);
            }
            ShellCommand::Status => {
                let line = text_summary::build_status_line(self.orch.busy());
                self.say(line);
            }
        }

        if starts_op {
            // Let the new task take its busy flag before the next command is read.
            tokio::task::yield_now().await;
        }
        true
    }

    fn spawn_add(&self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        let orch = self.orch.clone();
        let draft = self.draft.clone();
        tokio::spawn(async move {
            match orch.add(&text).await {
                OpOutcome::Succeeded => *draft.lock().await = None,
                OpOutcome::Failed => *draft.lock().await = Some(text),
                OpOutcome::Skipped => {}
            }
        });
    }

    fn spawn_benchmark(&self, llm: Option<String>) {
        let orch = self.orch.clone();
        let out = self.out.clone();
        let args = self.args.clone();
        tokio::spawn(async move {
            let outcome = orch.benchmark(llm.is_some(), llm.as_deref()).await;
            if !outcome.is_success() {
                return;
            }
            let state = orch.state().await;
            if let Some(metrics) = state.metrics.as_ref() {
                let processed =
                    orchestrator::process_benchmark_completion(&args, llm.as_deref(), metrics);
                if let Some(path) = processed.auto_saved_path {
                    let _ = out.send(OutputLine::Stderr(format!("Saved: {}", path.display())));
                }
                for msg in processed.export_messages {
                    let _ = out.send(OutputLine::Stderr(msg));
                }
            }
        });
    }
}

pub(crate) async fn run<T: RagTransport + 'static>(args: Cli, orch: Orchestrator<T>) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let mut shell = Shell {
        args,
        orch: Arc::new(orch),
        out: out_tx,
        settings: SearchSettings::default(),
        draft: Arc::new(Mutex::new(None)),
        log_cursor: 0,
    };

    shell.say(format!(
        "Connected to {} (type `help` for commands)",
        shell.args.base_url
    ));
    shell.orch.refresh().await;
    shell.flush_log().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut log_tick = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(cmd) => {
                        if !shell.dispatch(cmd).await {
                            break;
                        }
                    }
                    Err(msg) => shell.say(msg),
                }
            }
            _ = log_tick.tick() => {
                shell.flush_log().await;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    shell.flush_log().await;
    // Operations still in flight hold writer handles; don't wait for them to finish.
    drop(shell);
    let _ = tokio::time::timeout(Duration::from_secs(1), out_handle).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{gate, ScriptedTransport};
    use clap::Parser;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn second_list_is_refused_while_first_runs() {
        let transport = ScriptedTransport::default();
        let reply = gate(&transport.lists);
        let (out, mut said) = mpsc::unbounded_channel();
        let mut shell = Shell {
            args: Cli::try_parse_from(["rag-bench-cli"]).unwrap(),
            orch: Arc::new(Orchestrator::new(transport)),
            out,
            settings: SearchSettings::default(),
            draft: Arc::new(Mutex::new(None)),
            log_cursor: 0,
        };

        assert!(shell.dispatch(ShellCommand::List).await);
        while shell.orch.transport().calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(shell.orch.is_busy(OpKind::Refresh));

        assert!(shell.dispatch(ShellCommand::List).await);
        match said.try_recv() {
            Ok(OutputLine::Stdout(line)) => assert_eq!(line, "refresh already in progress"),
            _ => panic!("expected a refusal notice"),
        }
        assert_eq!(shell.orch.transport().calls(), vec!["list"]);

        reply.send(Ok(Vec::new())).unwrap();
        while shell.orch.is_busy(OpKind::Refresh) {
            tokio::task::yield_now().await;
        }
        assert_eq!(shell.orch.snapshot().await.log.len(), 1);
    }

    #[test]
    fn parses_operations() {
        assert_eq!(parse_line("list"), Ok(ShellCommand::List));
        assert_eq!(
            parse_line("add   the quick brown fox "),
            Ok(ShellCommand::Add("the quick brown fox".into()))
        );
        assert_eq!(
            parse_line("search what is rag"),
            Ok(ShellCommand::Search("what is rag".into()))
        );
        assert_eq!(parse_line("bench"), Ok(ShellCommand::Benchmark(None)));
        assert_eq!(
            parse_line("benchmark llama3"),
            Ok(ShellCommand::Benchmark(Some("llama3".into())))
        );
        assert_eq!(parse_line("   "), Ok(ShellCommand::Empty));
    }

    #[test]
    fn parses_settings() {
        assert_eq!(parse_line("set top_k 5"), Ok(ShellCommand::SetTopK(5)));
        assert_eq!(
            parse_line("set threshold 0.5"),
            Ok(ShellCommand::SetThreshold(0.5))
        );
        assert!(parse_line("set top_k many").is_err());
        assert!(parse_line("set colour blue").is_err());
        assert!(parse_line("set").is_err());
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = parse_line("frobnicate").unwrap_err();
        assert!(err.contains("frobnicate"));
    }

    #[test]
    fn op_kinds_map_to_busy_flags() {
        assert_eq!(ShellCommand::List.op_kind(), Some(OpKind::Refresh));
        assert_eq!(ShellCommand::Retry.op_kind(), Some(OpKind::Add));
        assert_eq!(
            ShellCommand::Benchmark(None).op_kind(),
            Some(OpKind::Benchmark)
        );
        assert_eq!(ShellCommand::Metrics.op_kind(), None);
    }
}
