//! Sequential merge of generated blocks into a previous document.

use super::extract::{Scan, scan};
use super::{CodeBlock, extract};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, warn};

/// How a new block finds the existing block it replaces.
///
/// Chosen once per deployment, not per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Match on the fence language tag.
    #[default]
    Language,
    /// Match on the `file:` marker of the first body line.
    Filename,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "language" | "lang" | "by-language" => Ok(Self::Language),
            "filename" | "file" | "by-filename" => Ok(Self::Filename),
            other => Err(format!("unknown merge strategy '{other}' (expected 'language' or 'filename')")),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Language => "language",
            Self::Filename => "filename",
        })
    }
}

/// What happens to one new block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Substitute the block for this byte range of the current document.
    ReplaceAt(Range<usize>),
    /// Add the block at the end of the current document.
    Append,
}

/// Result of one merge call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// The document after every new block was applied.
    pub merged_text: String,
    /// Number of blocks found in the model output.
    pub ai_blocks_count: usize,
    /// Blocks that replaced an existing block.
    pub matched: usize,
    /// Blocks that were appended.
    pub appended: usize,
    /// Identifiers of replaced blocks, in processing order.
    pub replaced: Vec<String>,
    /// Identifiers of appended blocks, in processing order.
    pub unmatched: Vec<String>,
    /// True when the raw model output had no blocks and was appended whole.
    pub fallback: bool,
    /// Filenames marked on more than one block of the previous document.
    pub ambiguous: Vec<String>,
}

/// Merges `new_blocks` into `previous`, one block at a time, in order.
///
/// Each block is matched against the document as left by the blocks before
/// it. Once an identifier has been placed (replaced or appended) later blocks
/// with the same identifier are appended, so one call never overwrites the
/// same target twice.
///
/// `previous` is scanned once. Replacements and appends update a table of
/// block spans instead of rescanning, so an unterminated fence at the end of
/// `previous` is never paired with text written here. Appended blocks go in
/// front of such a fence, which stays byte-for-byte at the end.
#[must_use]
pub fn merge_blocks(previous: &str, new_blocks: &[CodeBlock], strategy: MergeStrategy) -> MergeOutcome {
    let initial = scan(previous);
    let mut outcome = MergeOutcome {
        ai_blocks_count: new_blocks.len(),
        ambiguous: duplicate_targets(&initial.blocks, strategy),
        ..MergeOutcome::default()
    };
    for name in &outcome.ambiguous {
        warn!(filename = %name, "Several blocks carry the same file marker; replacing the first");
    }

    let mut document = LiveDocument::new(previous, &initial, strategy);
    let mut consumed: HashSet<String> = HashSet::new();

    for block in new_blocks {
        let action = plan(&document.slots, block, strategy, &consumed);
        let id = identifier(block, strategy);
        debug!(block = %id, action = ?action, "Merging block");

        match action {
            MergeAction::ReplaceAt(span) => {
                document.replace(&span, &block.fenced());
                outcome.matched += 1;
                outcome.replaced.push(id);
            }
            MergeAction::Append => {
                document.append(&block.fenced(), block.target(strategy));
                outcome.appended += 1;
                outcome.unmatched.push(id);
            }
        }

        if let Some(target) = block.target(strategy) {
            consumed.insert(target.to_string());
        }
    }

    outcome.merged_text = document.finish();
    outcome
}

/// Extracts blocks from raw model output and merges them into `previous`.
///
/// Output without any fenced block is appended verbatim so nothing the model
/// said is lost. Blank output leaves `previous` untouched.
#[must_use]
pub fn merge_response(previous: &str, raw_output: &str, strategy: MergeStrategy) -> MergeOutcome {
    let new_blocks = extract(raw_output);
    if !new_blocks.is_empty() {
        return merge_blocks(previous, &new_blocks, strategy);
    }

    let fallback = !raw_output.trim().is_empty();
    if !fallback {
        return MergeOutcome { merged_text: previous.to_string(), ..MergeOutcome::default() };
    }

    warn!(output_len = raw_output.len(), "Model output has no fenced blocks; appending it verbatim");
    let mut document = LiveDocument::new(previous, &scan(previous), strategy);
    document.append(raw_output, None);
    MergeOutcome { merged_text: document.finish(), fallback, ..MergeOutcome::default() }
}

/// A block of the document being merged.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    target: Option<String>,
    span: Range<usize>,
}

/// The document under construction and the spans of its blocks.
#[derive(Debug)]
struct LiveDocument {
    text: String,
    slots: Vec<Slot>,
    /// Unterminated fence and everything after it, set aside until the end.
    open_tail: String,
    grew: bool,
}

impl LiveDocument {
    fn new(previous: &str, initial: &Scan, strategy: MergeStrategy) -> Self {
        let split = initial.open_fence.unwrap_or(previous.len());
        let slots = initial
            .blocks
            .iter()
            .map(|block| Slot { target: block.target(strategy).map(str::to_string), span: block.span.clone() })
            .collect();
        Self { text: previous[..split].to_string(), slots, open_tail: previous[split..].to_string(), grew: false }
    }

    /// Substitutes `section` for the block at `span` and shifts later spans.
    fn replace(&mut self, span: &Range<usize>, section: &str) {
        self.text.replace_range(span.clone(), section);
        let end = span.start + section.len();
        for slot in &mut self.slots {
            if slot.span == *span {
                slot.span = span.start..end;
            } else if slot.span.start >= span.end {
                slot.span = slot.span.start - span.end + end..slot.span.end - span.end + end;
            }
        }
    }

    fn append(&mut self, section: &str, target: Option<&str>) {
        append_section(&mut self.text, section);
        let end = self.text.len();
        self.slots.push(Slot { target: target.map(str::to_string), span: end - section.len()..end });
        self.grew = true;
    }

    /// Reattaches the unterminated tail, after a blank line if anything was appended.
    fn finish(mut self) -> String {
        if self.grew && !self.open_tail.is_empty() {
            append_section(&mut self.text, &self.open_tail);
        } else {
            self.text.push_str(&self.open_tail);
        }
        self.text
    }
}

/// Decides where `block` goes in a document whose blocks are `slots`.
fn plan(slots: &[Slot], block: &CodeBlock, strategy: MergeStrategy, consumed: &HashSet<String>) -> MergeAction {
    let Some(target) = block.target(strategy) else {
        return MergeAction::Append;
    };
    if consumed.contains(target) {
        return MergeAction::Append;
    }

    slots
        .iter()
        .find(|slot| slot.target.as_deref() == Some(target))
        .map_or(MergeAction::Append, |slot| MergeAction::ReplaceAt(slot.span.clone()))
}

fn identifier(block: &CodeBlock, strategy: MergeStrategy) -> String {
    block.target(strategy).map_or_else(|| format!("<{}>", block.language), str::to_string)
}

/// Appends `section` after a blank line.
fn append_section(document: &mut String, section: &str) {
    if !document.is_empty() && !document.ends_with("\n\n") {
        let separator = if document.ends_with('\n') { "\n" } else { "\n\n" };
        document.push_str(separator);
    }
    document.push_str(section);
}

/// Filenames that more than one of `blocks` claims.
fn duplicate_targets(blocks: &[CodeBlock], strategy: MergeStrategy) -> Vec<String> {
    if strategy != MergeStrategy::Filename {
        return Vec::new();
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for name in blocks.iter().filter_map(|block| block.filename.as_deref()) {
        let count = seen.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(name.to_string());
        }
    }
    order
}
