//! Fenced code block extraction and merging.
//!
//! A document is plain text with zero or more fenced blocks in it:
//!
//! ````text
//! Some prose.
//!
//! ```js
//! // file: src/app.js
//! console.log("hi");
//! ```
//! ````
//!
//! [`extract`] finds the blocks; [`merge_blocks`] and [`merge_response`] fold
//! freshly generated blocks back into a previous document.

mod extract;
mod merge;

pub use extract::{FILE_MARKER_KEYWORD, extract, extract_opt, parse_file_marker};
pub use merge::{MergeAction, MergeOutcome, MergeStrategy, merge_blocks, merge_response};

use serde::Serialize;
use std::ops::Range;

/// The three-backtick fence that opens and closes a block.
pub const FENCE: &str = "```";

/// A fenced code block found in a document.
///
/// Only [`extract`] creates these, so a body never contains [`FENCE`] and
/// [`fenced`](Self::fenced) always yields exactly one block. A corrected
/// block is a new value, never an edit of an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    language: String,
    body: String,
    filename: Option<String>,
    raw: String,
    span: Range<usize>,
}

impl CodeBlock {
    /// Lowercased token right after the opening fence.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Text between the opening line break and the closing fence, without
    /// the one line break that precedes the closing fence.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Path from a `file:` marker on the first body line.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The whole block, fences included, exactly as it appeared.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Byte range of [`raw`](Self::raw) in the text the block was extracted from.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Canonical fenced form: `` ```<language>\n<body>\n``` ``.
    #[must_use]
    pub fn fenced(&self) -> String {
        format!("{FENCE}{}\n{}\n{FENCE}", self.language, self.body)
    }

    /// The identifier this block is matched by under `strategy`.
    #[must_use]
    pub fn target(&self, strategy: MergeStrategy) -> Option<&str> {
        match strategy {
            MergeStrategy::Language => Some(&self.language),
            MergeStrategy::Filename => self.filename.as_deref(),
        }
    }
}
