//! `weaver serve`.

use anyhow::{Context, Result};
use weaver_core::Config;

/// Arguments for `weaver serve`.
#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.address)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Merge strategy (language, filename)
    #[arg(long)]
    pub strategy: Option<weaver_core::MergeStrategy>,
}

/// Runs the HTTP API until Ctrl-C.
pub async fn execute(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(strategy) = args.strategy {
        config.merge.strategy = strategy;
    }
    config.validate()?;

    weaver_core::server::serve(&config)
        .await
        .with_context(|| format!("Server on {} stopped", config.server.address))
}
