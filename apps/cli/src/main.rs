//! Weaver CLI - generate and merge fenced-block projects from the command line.
//!
//! This CLI provides a `weaver` command that runs the HTTP API, calls a model
//! for a single change request, or merges saved model output offline.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use weaver_core::Config;

use commands::{extract, generate, merge, serve};

/// Weaver - merge model-generated code blocks into a living project document
#[derive(Parser, Debug)]
#[command(
    name = "weaver",
    author,
    version,
    about = "Weaver - merge model-generated code blocks into a project document",
    long_about = "Weaver asks a generative model for fenced code blocks and merges them into an existing project text,\nreplacing blocks by language or by file marker and appending the rest."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Configuration file (replaces ./weaver.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    ///
    /// Serves POST /api/generate, POST /api/merge and GET /health until Ctrl-C.
    Serve(serve::ServeArgs),

    /// Ask the model for a change and merge it into a project file
    Generate(generate::GenerateArgs),

    /// Merge saved model output into a project file without calling a model
    Merge(merge::MergeArgs),

    /// List the fenced code blocks in a file
    Extract(extract::ExtractArgs),
}

fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.without_time().finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let config_path = args.config.as_deref();

    match args.command {
        Command::Serve(serve_args) => serve::execute(Config::discover(config_path)?, serve_args).await,
        Command::Generate(generate_args) => generate::execute(Config::discover(config_path)?, generate_args).await,
        Command::Merge(merge_args) => merge::execute(&Config::discover(config_path)?, &merge_args),
        Command::Extract(extract_args) => extract::execute(&extract_args),
    }
}
