//! `weaver merge`.

use anyhow::Result;
use std::path::PathBuf;
use weaver_core::{Config, GenerateResponse, MergeStrategy, merge_response};

use super::{emit, read_input};

/// Arguments for `weaver merge`.
#[derive(Debug, clap::Args)]
pub struct MergeArgs {
    /// Current project file
    #[arg(long)]
    pub previous: PathBuf,

    /// File holding the model output (`-` for stdin)
    #[arg(short, long)]
    pub response: PathBuf,

    /// Merge strategy (language, filename)
    #[arg(long)]
    pub strategy: Option<MergeStrategy>,

    /// Write the merged project here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Merges saved output into the project.
pub fn execute(config: &Config, args: &MergeArgs) -> Result<()> {
    let strategy = args.strategy.unwrap_or(config.merge.strategy);
    let previous = read_input(&args.previous)?;
    let raw = read_input(&args.response)?;

    let outcome = merge_response(&previous, &raw, strategy);
    emit(&GenerateResponse::from_outcome(outcome, raw), args.out.as_ref(), args.json)
}
