use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use monitor::config::RunArgs;
use monitor::{producer, run};

#[derive(Parser)]
#[command(name = "monitor", version)]
struct Cli {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "VERBOSE")]
    verbose: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the integrity monitor against the configured targets
    Run(Box<RunArgs>),
    /// Hash an extracted image filesystem and write a reference snapshot
    Snapshot(producer::SnapshotArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.verbose).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Command::Run(args) => run::run(*args).await,
        Command::Snapshot(args) => producer::run_snapshot(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
