//! `weaver generate`.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::info;
use weaver_core::{Config, GenerateRequest, MergeStrategy, ProjectGenerator};

use super::{emit, read_input};

/// Arguments for `weaver generate`.
#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// The change request
    #[arg(short, long)]
    pub prompt: String,

    /// Current project file (`-` for stdin)
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// Write the merged project here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Model id (overrides model.model_id)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model provider: mock, openai, claude (overrides model.model_type)
    #[arg(long)]
    pub model_type: Option<String>,

    /// Merge strategy (language, filename)
    #[arg(long)]
    pub strategy: Option<MergeStrategy>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Completion length cap
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Calls the model once and merges its answer.
pub async fn execute(mut config: Config, args: GenerateArgs) -> Result<()> {
    if args.prompt.trim().is_empty() {
        bail!("--prompt must not be empty");
    }

    if let Some(model_type) = args.model_type {
        config.model.model_type = model_type;
    }
    if let Some(model_id) = args.model {
        config.model.model_id = model_id;
    }
    if let Some(strategy) = args.strategy {
        config.merge.strategy = strategy;
    }
    config.validate()?;

    let previous = args.previous.as_deref().map(read_input).transpose()?;
    let generator = ProjectGenerator::from_config(&config).context("Failed to set up the model")?;
    info!(model = %generator.model_id(), strategy = %generator.strategy(), "Generating");

    let request = GenerateRequest {
        prompt: args.prompt,
        previous_project: previous,
        model: None,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    };
    let response = generator.generate(request).await.context("Generation failed")?;

    emit(&response, args.out.as_ref(), args.json)
}
