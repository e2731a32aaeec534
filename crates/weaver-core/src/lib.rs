//! Weaver Core - fenced-block project generation and merging.
//!
//! This crate provides:
//! - [`blocks`]: extraction of fenced code blocks and the sequential merger
//! - [`generator`]: one model call plus one merge per request
//! - [`server`]: the HTTP API around the generator
//! - Configuration and error handling
//!
//! # Example
//!
//! ```rust
//! use weaver_core::blocks::{MergeStrategy, merge_response};
//!
//! let previous = "```js\nold();\n```\n\n```html\n<p></p>\n```";
//! let outcome = merge_response(previous, "```js\nnew();\n```", MergeStrategy::Language);
//! assert_eq!(outcome.merged_text, "```js\nnew();\n```\n\n```html\n<p></p>\n```");
//! ```

pub mod blocks;
pub mod config;
pub mod error;
pub mod generator;
pub mod prompts;
pub mod server;

pub use blocks::{CodeBlock, MergeOutcome, MergeStrategy, extract, merge_blocks, merge_response};
pub use config::{Config, ConfigError};
pub use error::{Result, WeaverError};
pub use generator::{GenerateRequest, GenerateResponse, MergeRequest, ProjectGenerator};
pub use server::WeaverServer;
