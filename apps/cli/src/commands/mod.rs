//! Subcommand implementations.

pub mod extract;
pub mod generate;
pub mod merge;
pub mod serve;

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use weaver_core::GenerateResponse;

/// Reads `path`, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Prints or writes a merge result.
///
/// With `json` the whole response goes to stdout. Otherwise the project goes
/// to `out` (or stdout) and a summary to stderr.
pub fn emit(response: &GenerateResponse, out: Option<&PathBuf>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    match out {
        Some(path) => {
            fs::write(path, &response.project).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Wrote".green().bold(), path.display());
        }
        None => println!("{}", response.project),
    }
    print_summary(response);
    Ok(())
}

fn print_summary(response: &GenerateResponse) {
    if response.fallback {
        eprintln!(
            "{} model output had no fenced blocks; appended it verbatim",
            "!".yellow().bold()
        );
        return;
    }

    eprintln!(
        "{} {} block(s): {} replaced, {} appended",
        "✓".green().bold(),
        response.ai_blocks_count,
        response.matched_count,
        response.appended_count
    );
    if !response.replaced.is_empty() {
        eprintln!("  {} {}", "replaced:".dimmed(), response.replaced.join(", "));
    }
    if !response.unmatched.is_empty() {
        eprintln!("  {} {}", "appended:".dimmed(), response.unmatched.join(", "));
    }
    for name in &response.ambiguous {
        eprintln!("  {} several blocks are marked '{}'; the first was used", "!".yellow().bold(), name);
    }
}
