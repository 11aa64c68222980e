use anyhow::Result;
use clap::Parser;
use rag_bench::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    rag_bench::logging::init(args.verbose);
    cli::run(args).await
}
