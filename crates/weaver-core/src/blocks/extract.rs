//! Fence scanner.
//!
//! A byte-level state machine instead of a pattern engine: the first closing
//! fence after an opening line always ends the block, and no input can make
//! the scan backtrack further than one fence line.

use super::CodeBlock;
use std::ops::Range;

/// Keyword of the first-line marker that ties a block to a file.
pub const FILE_MARKER_KEYWORD: &str = "file:";

/// Comment openers accepted in front of the marker keyword. Longest first.
const COMMENT_OPENERS: &[&str] = &["<!--", "//", "/*", "--", "#", ";"];

/// Comment closers stripped from the end of a marker line.
const COMMENT_CLOSERS: &[&str] = &["-->", "*/"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    /// Between blocks; `ticks` counts consecutive backticks seen so far.
    OutsideBlock { ticks: usize },
    /// After an opening fence, reading the language token.
    InOpeningFenceLine { start: usize, tag_start: usize },
    /// Inside the body.
    InBody { start: usize, tag: Range<usize>, body_start: usize },
    /// Inside a run of backticks that may close the block.
    InClosingFence { start: usize, tag: Range<usize>, body_start: usize, fence_start: usize, ticks: usize },
}

/// Blocks of one text plus where its unterminated trailing fence starts.
#[derive(Debug)]
pub(super) struct Scan {
    pub(super) blocks: Vec<CodeBlock>,
    /// Start of an opening fence that nothing closes. Any fence appended
    /// after it would close it, so text must be written before this offset.
    pub(super) open_fence: Option<usize>,
}

/// Extracts every well-formed fenced block from `text`, in source order.
///
/// Never fails. Text without fences, unterminated fences and fences without
/// a language token simply yield no block.
#[must_use]
pub fn extract(text: &str) -> Vec<CodeBlock> {
    scan(text).blocks
}

pub(super) fn scan(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut state = ScanState::OutsideBlock { ticks: 0 };
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        state = match state {
            ScanState::OutsideBlock { ticks } if byte == b'`' => {
                if ticks == 2 {
                    ScanState::InOpeningFenceLine { start: i - 2, tag_start: i + 1 }
                } else {
                    ScanState::OutsideBlock { ticks: ticks + 1 }
                }
            }
            ScanState::OutsideBlock { .. } => ScanState::OutsideBlock { ticks: 0 },
            ScanState::InOpeningFenceLine { start, tag_start } => {
                let has_tag = i > tag_start;
                if is_tag_byte(byte) {
                    ScanState::InOpeningFenceLine { start, tag_start }
                } else if has_tag && byte == b'\n' {
                    ScanState::InBody { start, tag: tag_start..i, body_start: i + 1 }
                } else if has_tag && byte == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                    ScanState::InBody { start, tag: tag_start..i - 1, body_start: i + 1 }
                } else if has_tag && byte == b'\r' && i + 1 == bytes.len() {
                    // A final CR still becomes a line break once text follows.
                    ScanState::InOpeningFenceLine { start, tag_start }
                } else {
                    // Not an opening fence: rescan from the second backtick.
                    i = start;
                    ScanState::OutsideBlock { ticks: 0 }
                }
            }
            ScanState::InBody { start, tag, body_start } => {
                if byte == b'`' {
                    ScanState::InClosingFence { start, tag, body_start, fence_start: i, ticks: 1 }
                } else {
                    ScanState::InBody { start, tag, body_start }
                }
            }
            ScanState::InClosingFence { start, tag, body_start, fence_start, ticks } => {
                if byte != b'`' {
                    ScanState::InBody { start, tag, body_start }
                } else if ticks == 2 {
                    blocks.push(build_block(text, start..i + 1, tag, body_start..fence_start));
                    ScanState::OutsideBlock { ticks: 0 }
                } else {
                    ScanState::InClosingFence { start, tag, body_start, fence_start, ticks: ticks + 1 }
                }
            }
        };
        i += 1;
    }

    let open_fence = match state {
        ScanState::OutsideBlock { .. } => None,
        ScanState::InOpeningFenceLine { start, tag_start } => (bytes.len() > tag_start).then_some(start),
        ScanState::InBody { start, .. } | ScanState::InClosingFence { start, .. } => Some(start),
    };
    Scan { blocks, open_fence }
}

/// [`extract`] for input that may be absent.
#[must_use]
pub fn extract_opt(text: Option<&str>) -> Vec<CodeBlock> {
    text.map(extract).unwrap_or_default()
}

/// Reads a `file:` marker from a single line.
///
/// The line must be a comment (`//`, `#`, `--`, `;`, `/*` or `<!--`) whose
/// text starts with the exact keyword `file:`. Anything else, ordinary
/// comments mentioning paths included, is not a marker.
#[must_use]
pub fn parse_file_marker(line: &str) -> Option<String> {
    let line = line.trim();
    let after_opener = COMMENT_OPENERS.iter().find_map(|opener| line.strip_prefix(opener))?;
    let mut path = after_opener.trim_start().strip_prefix(FILE_MARKER_KEYWORD)?.trim();

    for closer in COMMENT_CLOSERS {
        if let Some(stripped) = path.strip_suffix(closer) {
            path = stripped.trim_end();
        }
    }

    if path.is_empty() { None } else { Some(path.to_string()) }
}

fn is_tag_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'+' | b'#' | b'.')
}

fn build_block(text: &str, span: Range<usize>, tag: Range<usize>, body: Range<usize>) -> CodeBlock {
    let mut body = &text[body];
    if let Some(stripped) = body.strip_suffix('\n') {
        body = stripped.strip_suffix('\r').unwrap_or(stripped);
    }

    CodeBlock {
        language: text[tag].to_ascii_lowercase(),
        body: body.to_string(),
        filename: body.lines().next().and_then(parse_file_marker),
        raw: text[span.clone()].to_string(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fences() {
        assert!(extract("Sure, here's your code: done.").is_empty());
        assert!(extract("").is_empty());
        assert!(extract_opt(None).is_empty());
    }

    #[test]
    fn test_single_block() {
        let text = "Intro\n\n```js\nconsole.log(1);\n```\n\nOutro";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);

        let block = &blocks[0];
        assert_eq!(block.language, "js");
        assert_eq!(block.body, "console.log(1);");
        assert_eq!(block.raw, "```js\nconsole.log(1);\n```");
        assert_eq!(&text[block.span.clone()], block.raw);
        assert_eq!(block.filename, None);
    }

    #[test]
    fn test_language_lowercased() {
        let blocks = extract("```HTML\n<p></p>\n```");
        assert_eq!(blocks[0].language, "html");
        assert_eq!(blocks[0].raw, "```HTML\n<p></p>\n```");
    }

    #[test]
    fn test_adjacent_blocks_not_merged() {
        let text = "```js\na\n```\n```css\nb\n```";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].body, "a");
        assert_eq!(blocks[1].language, "css");
        assert_eq!(blocks[1].body, "b");
        assert!(blocks[0].span.end <= blocks[1].span.start);
    }

    #[test]
    fn test_multiline_body_preserved() {
        let text = "```python\ndef f():\n\n    return 1\n\n```";
        let blocks = extract(text);
        assert_eq!(blocks[0].body, "def f():\n\n    return 1\n");
    }

    #[test]
    fn test_unterminated_block_ignored() {
        let text = "```js\nconsole.log(1);\n// never closed";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn test_unterminated_after_complete_block() {
        let text = "```js\na\n```\n\n```css\nb {";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "js");
        assert_eq!(scan(text).open_fence, Some(13));
    }

    #[test]
    fn test_open_fence_position() {
        assert_eq!(scan("```js\na\n```").open_fence, None);
        assert_eq!(scan("prose ``` more").open_fence, None);
        assert_eq!(scan("intro\n```js\nhalf").open_fence, Some(6));
        assert_eq!(scan("intro\n```js").open_fence, Some(6));
        assert_eq!(scan("intro\n```js\r").open_fence, Some(6));
        assert_eq!(scan("```css\nbroken ``").open_fence, Some(0));
        assert_eq!(scan("ends with ```").open_fence, None);
    }

    #[test]
    fn test_fence_without_language_is_not_a_block() {
        let text = "```\nplain\n```\n\n```rust\nfn main() {}\n```";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "rust");
        assert_eq!(blocks[0].body, "fn main() {}");
    }

    #[test]
    fn test_space_before_language_is_not_a_block() {
        assert!(extract("``` js\nx\n```").is_empty());
    }

    #[test]
    fn test_four_backticks_open_at_last_three() {
        let blocks = extract("````js\nx\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw, "```js\nx\n```");
        assert_eq!(blocks[0].span, 1..12);
    }

    #[test]
    fn test_first_closing_fence_wins() {
        let text = "```md\nuse ``` here\n```";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "use ");
        assert_eq!(blocks[0].raw, "```md\nuse ```");
    }

    #[test]
    fn test_single_backticks_in_body() {
        let text = "```js\nconst s = `x${y}`;\n```";
        let blocks = extract(text);
        assert_eq!(blocks[0].body, "const s = `x${y}`;");
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "```js\r\nlet a = 1;\r\n```";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "js");
        assert_eq!(blocks[0].body, "let a = 1;");
    }

    #[test]
    fn test_tag_characters() {
        let blocks = extract("```c++\nint x;\n```\n```objective-c\n@end\n```\n```c#\nvar x;\n```");
        let languages: Vec<_> = blocks.iter().map(|b| b.language.as_str()).collect();
        assert_eq!(languages, ["c++", "objective-c", "c#"]);
    }

    #[test]
    fn test_non_ascii_text_around_blocks() {
        let text = "Voilà — ✨\n```js\nconst é = 'ü';\n```\nfin ✓";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "const é = 'ü';");
        assert_eq!(&text[blocks[0].span.clone()], blocks[0].raw);
    }

    #[test]
    fn test_filename_marker_recovered() {
        let blocks = extract("```js\n// file: src/app.js\nexport {};\n```");
        assert_eq!(blocks[0].filename.as_deref(), Some("src/app.js"));
        assert!(blocks[0].body.starts_with("// file: src/app.js\n"));
    }

    #[test]
    fn test_filename_marker_only_on_first_line() {
        let blocks = extract("```js\nexport {};\n// file: src/app.js\n```");
        assert_eq!(blocks[0].filename, None);
    }

    #[test]
    fn test_parse_file_marker_variants() {
        assert_eq!(parse_file_marker("// file: src/app.js").as_deref(), Some("src/app.js"));
        assert_eq!(parse_file_marker("#file:app.py").as_deref(), Some("app.py"));
        assert_eq!(parse_file_marker("-- file: db/schema.sql").as_deref(), Some("db/schema.sql"));
        assert_eq!(parse_file_marker("; file: init.el").as_deref(), Some("init.el"));
        assert_eq!(parse_file_marker("/* file: styles/main.css */").as_deref(), Some("styles/main.css"));
        assert_eq!(parse_file_marker("<!-- file: index.html -->").as_deref(), Some("index.html"));
        assert_eq!(parse_file_marker("  //   file:   a b.txt  ").as_deref(), Some("a b.txt"));
    }

    #[test]
    fn test_parse_file_marker_rejects_ordinary_comments() {
        assert_eq!(parse_file_marker("// src/app.js"), None);
        assert_eq!(parse_file_marker("// this file: is great"), None);
        assert_eq!(parse_file_marker("// File: src/app.js"), None);
        assert_eq!(parse_file_marker("file: src/app.js"), None);
        assert_eq!(parse_file_marker("// file:"), None);
        assert_eq!(parse_file_marker("<!-- file: -->"), None);
    }
}
