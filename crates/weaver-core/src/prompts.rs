//! Instructions sent to the model.
//!
//! The merger only understands fenced blocks, so the instruction asks for
//! nothing else. In filename mode it also asks for the `file:` marker that
//! [`parse_file_marker`](crate::blocks::parse_file_marker) recognizes.

use crate::blocks::{FILE_MARKER_KEYWORD, MergeStrategy};
use weaver_abstraction::ChatMessage;

const BASE_RULES: &str = "\
You edit a software project that is stored as one text document of fenced code blocks.
Answer ONLY with fenced code blocks. Do not write prose before, between or after them.
Open every block with three backticks immediately followed by an accurate lowercase language tag \
(for example ```html, ```css, ```js) and close it with three backticks on their own line.
Return complete blocks, never fragments or diffs. Only return blocks that change or are new.";

/// System message for `strategy`.
#[must_use]
pub fn system_prompt(strategy: MergeStrategy) -> String {
    match strategy {
        MergeStrategy::Language => format!(
            "{BASE_RULES}\nUse at most one block per language; a block replaces the existing block of the same language."
        ),
        MergeStrategy::Filename => format!(
            "{BASE_RULES}\nThe first line of every block must be a comment of the form \
             `// {FILE_MARKER_KEYWORD} <path>` (use `#`, `--` or `<!-- ... -->` where the language needs it). \
             A block replaces the existing block with the same path."
        ),
    }
}

/// User message carrying the request and, when present, the current project.
#[must_use]
pub fn user_prompt(prompt: &str, previous: Option<&str>) -> String {
    match previous.filter(|text| !text.trim().is_empty()) {
        Some(project) => format!("Current project:\n\n{project}\n\nRequested change:\n{}", prompt.trim()),
        None => format!("Create a new project.\n\nRequest:\n{}", prompt.trim()),
    }
}

/// The full conversation for one generation request.
#[must_use]
pub fn build_messages(prompt: &str, previous: Option<&str>, strategy: MergeStrategy) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system_prompt(strategy)), ChatMessage::user(user_prompt(prompt, previous))]
}
