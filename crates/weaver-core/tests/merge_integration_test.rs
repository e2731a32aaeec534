//! End-to-end properties of extraction and merging.

use weaver_core::blocks::{CodeBlock, MergeStrategy, extract, merge_blocks, merge_response};

const PROJECT: &str = "\
# Landing page

Intro text that must survive every merge.

```html
<!-- file: index.html -->
<main>Hello</main>
```

Some notes between blocks.

```css
/* file: styles/main.css */
main { color: black; }
```

```js
// file: src/app.js
console.log(\"v1\");
```

Closing remarks.
";

/// Substitutes each block's canonical form for its own span, last to first.
fn reserialize(text: &str, blocks: &[CodeBlock]) -> String {
    let mut rebuilt = text.to_string();
    for block in blocks.iter().rev() {
        rebuilt.replace_range(block.span(), &block.fenced());
    }
    rebuilt
}

#[test]
fn test_n_blocks_in_source_order() {
    let blocks = extract(PROJECT);
    let languages: Vec<_> = blocks.iter().map(|b| b.language()).collect();
    assert_eq!(languages, ["html", "css", "js"]);

    for pair in blocks.windows(2) {
        assert!(pair[0].span().end <= pair[1].span().start);
    }
    assert_eq!(blocks[2].body(), "// file: src/app.js\nconsole.log(\"v1\");");
}

#[test]
fn test_round_trip_is_byte_identical() {
    let blocks = extract(PROJECT);
    assert_eq!(reserialize(PROJECT, &blocks), PROJECT);

    let dense = "```py\nx = 1\n```\n```rb\nputs 1\n```text after";
    assert_eq!(reserialize(dense, &extract(dense)), dense);
}

#[test]
fn test_language_merge_keeps_unrelated_spans() {
    let outcome = merge_response(PROJECT, "```css\nmain { color: navy; }\n```", MergeStrategy::Language);

    let before = extract(PROJECT);
    let after = extract(&outcome.merged_text);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0].raw(), before[0].raw());
    assert_eq!(after[1].body(), "main { color: navy; }");
    assert_eq!(after[2].raw(), before[2].raw());
    assert!(outcome.merged_text.starts_with("# Landing page\n\nIntro text"));
    assert!(outcome.merged_text.ends_with("Closing remarks.\n"));
}

#[test]
fn test_filename_merge_replace_and_append() {
    let output = "\
```js
// file: src/app.js
console.log(\"v2\");
```

```js
// file: src/unknown.js
export {};
```";
    let outcome = merge_response(PROJECT, output, MergeStrategy::Filename);

    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.appended, 1);
    assert_eq!(outcome.replaced, ["src/app.js"]);
    assert_eq!(outcome.unmatched, ["src/unknown.js"]);

    let after = extract(&outcome.merged_text);
    assert_eq!(after.len(), 4);
    assert_eq!(after[2].body(), "// file: src/app.js\nconsole.log(\"v2\");");
    assert_eq!(after[3].filename(), Some("src/unknown.js"));
    assert!(outcome.merged_text.ends_with("Closing remarks.\n\n```js\n// file: src/unknown.js\nexport {};\n```"));
}

#[test]
fn test_filename_merge_without_marker_appends() {
    let outcome = merge_response(PROJECT, "```js\nalert(1);\n```", MergeStrategy::Filename);
    assert_eq!(outcome.matched, 0);
    assert_eq!(outcome.unmatched, ["<js>"]);
    assert_eq!(extract(&outcome.merged_text).len(), 4);
}

#[test]
fn test_no_fence_fallback() {
    let outcome = merge_response(PROJECT, "Sure, here's your code: done.", MergeStrategy::Language);
    assert!(outcome.fallback);
    assert_eq!(outcome.ai_blocks_count, 0);
    assert_eq!(outcome.matched, 0);
    assert_eq!(outcome.merged_text, format!("{PROJECT}\nSure, here's your code: done."));
}

#[test]
fn test_repeated_merge_is_not_idempotent() {
    let new_blocks = extract("```js\nfirst();\n```\n```js\nsecond();\n```");

    let once = merge_blocks("", &new_blocks, MergeStrategy::Language);
    let twice = merge_blocks(&once.merged_text, &new_blocks, MergeStrategy::Language);

    assert_ne!(once.merged_text, twice.merged_text);
    assert_eq!(extract(&once.merged_text).len(), 2);
    assert_eq!(extract(&twice.merged_text).len(), 3);
    assert_eq!(twice.matched, 1);
    assert_eq!(twice.appended, 1);
}

#[test]
fn test_later_block_sees_earlier_replacement() {
    // The second css block must not land on the span the first one just rewrote.
    let previous = "```css\na {}\n```\n\n```css\nb {}\n```";
    let outcome = merge_response(previous, "```css\nA {}\n```\n```css\nB {}\n```", MergeStrategy::Language);
    assert_eq!(outcome.merged_text, "```css\nA {}\n```\n\n```css\nb {}\n```\n\n```css\nB {}\n```");
}

#[test]
fn test_duplicate_filenames_reported() {
    let previous = "```js\n// file: a.js\none\n```\n\n```js\n// file: a.js\ntwo\n```";
    let outcome = merge_response(previous, "```js\n// file: a.js\nthree\n```", MergeStrategy::Filename);

    assert_eq!(outcome.ambiguous, ["a.js"]);
    assert_eq!(outcome.merged_text, "```js\n// file: a.js\nthree\n```\n\n```js\n// file: a.js\ntwo\n```");
}

#[test]
fn test_unterminated_fence_left_untouched() {
    let previous = "```js\nkeep();\n```\n\n```css\nbroken {";
    let outcome = merge_response(previous, "```css\nfixed {}\n```", MergeStrategy::Language);
    assert_eq!(outcome.matched, 0);
    assert!(outcome.merged_text.ends_with("\n\n```css\nbroken {"));

    let after = extract(&outcome.merged_text);
    let pairs: Vec<_> = after.iter().map(|b| (b.language(), b.body())).collect();
    assert_eq!(pairs, [("js", "keep();"), ("css", "fixed {}")]);
}

#[test]
fn test_blocks_appended_in_one_call_survive_unterminated_fence() {
    let outcome = merge_response("```js\nhalf", "```css\np {}\n```\n```js\nfull();\n```", MergeStrategy::Language);

    assert!(outcome.replaced.is_empty());
    assert_eq!(outcome.unmatched, ["css", "js"]);
    let after = extract(&outcome.merged_text);
    let pairs: Vec<_> = after.iter().map(|b| (b.language(), b.body())).collect();
    assert_eq!(pairs, [("css", "p {}"), ("js", "full();")]);
    assert!(outcome.merged_text.ends_with("```js\nhalf"));

    // A follow-up merge targets the completed js block, never the open one.
    let next = merge_response(&outcome.merged_text, "```js\nfinal();\n```", MergeStrategy::Language);
    assert_eq!(next.replaced, ["js"]);
    assert!(next.merged_text.contains("```js\nfinal();\n```") && next.merged_text.ends_with("```js\nhalf"));
}
