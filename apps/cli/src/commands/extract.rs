//! `weaver extract`.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use weaver_core::extract;

use super::read_input;

/// Arguments for `weaver extract`.
#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    /// File to scan (`-` for stdin)
    pub file: PathBuf,

    /// Print the blocks as JSON
    #[arg(long)]
    pub json: bool,
}

/// Lists the blocks in a file.
pub fn execute(args: &ExtractArgs) -> Result<()> {
    let text = read_input(&args.file)?;
    let blocks = extract(&text);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }

    if blocks.is_empty() {
        println!("No fenced code blocks found.");
        return Ok(());
    }

    for (index, block) in blocks.iter().enumerate() {
        let line = text[..block.span().start].matches('\n').count() + 1;
        let lines = block.body().lines().count();
        let file = block.filename().map(|f| format!("  {}", f.bold())).unwrap_or_default();
        println!("{:>3}. {:<12}{}  {}", index + 1, block.language().cyan(), file, format!("line {line}, {lines} line(s)").dimmed());
    }
    Ok(())
}
