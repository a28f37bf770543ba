//! Markdown format implementation
//!
//! Bidirectional conversion between the document model and CommonMark with the GFM
//! extensions (tables, strikethrough, task lists, footnotes) and dollar math.
//!
//! # Library Choice
//!
//! Parsing uses `comrak` with the extensions switched on. Serialization is written by
//! hand: the output must fall back to single-line HTML blocks for constructs Markdown has
//! no syntax for, which an AST formatter cannot express.
//!
//! # Element Mapping Table
//!
//! | Document                   | Markdown                                   | Notes                        |
//! |----------------------------|--------------------------------------------|------------------------------|
//! | paragraph line             | paragraph                                  | empty lines dropped or `<br>` |
//! | `header: N`, `header-id`   | `## Title {#id}`                           |                              |
//! | `list` + `indent`          | `- `, `1. `, `- [ ] `, `- [x] `            | 4 spaces per level           |
//! | `blockquote`               | `> ` lines                                 |                              |
//! | `code-block: L`            | fenced block with info string `L`          |                              |
//! | `table-row`/`table-col`    | GFM table                                  | HTML when not representable  |
//! | `align`, `indent`          | HTML block                                 |                              |
//! | bold, italic, strike, code | `**`, `*`, `~~`, backticks                 |                              |
//! | underline, script, mark, kbd, colors | inline HTML                      |                              |
//! | `image`                    | `![alt](src)`                              | `<img>` when sized or floated |
//! | `formula`                  | `$x$`, `$$x$$`                             | or HTML with `MathMode::Html` |
//! | `footnote-ref`, footnotes  | `[^id]`, `[^id]: …`                        |                              |
//! | `diagram`                  | fenced `mermaid` block                     |                              |
//! | `block`                    | handler Markdown, else its HTML            |                              |
//!
//! # Lossy Conversions
//!
//! - Whitespace at the edge of a formatted run moves outside the delimiters.
//! - Alignment inside a blockquote is dropped.
//! - Empty lines are dropped unless `preserve_empty_lines` is on.

mod inline_html;
mod parser;
mod preprocess;
mod serializer;

pub use parser::{parse_from_markdown, MarkdownParseOptions, MarkdownParser};
pub use serializer::{
    serialize_to_markdown, DiagramMode, MarkdownOptions, MarkdownSerializer, MathMode,
};

use super::html::apply_option;
use crate::attributes::AttributeRegistry;
use crate::blocks::BlockRegistry;
use crate::delta::Delta;
use crate::error::FormatError;
use crate::format::{bool_option, invalid_option, Format};
use std::collections::HashMap;

/// Format implementation for Markdown
#[derive(Default)]
pub struct MarkdownFormat {
    options: MarkdownOptions,
    parse_options: MarkdownParseOptions,
    blocks: BlockRegistry,
    attributes: AttributeRegistry,
}

impl MarkdownFormat {
    pub fn new(options: MarkdownOptions) -> Self {
        MarkdownFormat {
            options,
            ..Default::default()
        }
    }

    pub fn with_parse_options(mut self, options: MarkdownParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    pub fn with_blocks(mut self, blocks: BlockRegistry) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeRegistry) -> Self {
        self.attributes = attributes;
        self
    }

    fn options_with(
        &self,
        overrides: &HashMap<String, String>,
    ) -> Result<MarkdownOptions, FormatError> {
        let mut options = self.options.clone();
        for (key, value) in overrides {
            match key.as_str() {
                "preserve-empty-lines" => options.preserve_empty_lines = bool_option(key, value)?,
                "math" => {
                    options.math = MathMode::parse(value).ok_or_else(|| invalid_option(key, value))?
                }
                "diagram" => {
                    options.diagram =
                        DiagramMode::parse(value).ok_or_else(|| invalid_option(key, value))?
                }
                _ => {
                    if !apply_option(&mut options.html, key, value)? {
                        return Err(invalid_option(key, value));
                    }
                }
            }
        }
        Ok(options)
    }
}

impl Format for MarkdownFormat {
    fn name(&self) -> &str {
        "markdown"
    }

    fn description(&self) -> &str {
        "CommonMark Markdown with GFM extensions"
    }

    fn file_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Delta, FormatError> {
        Ok(MarkdownParser::new(&self.parse_options, &self.blocks, &self.attributes).parse(source))
    }

    fn serialize(&self, delta: &Delta) -> Result<String, FormatError> {
        Ok(MarkdownSerializer::new(&self.options, &self.blocks, &self.attributes).serialize(delta))
    }

    fn serialize_with_options(
        &self,
        delta: &Delta,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        let options = self.options_with(options)?;
        Ok(MarkdownSerializer::new(&options, &self.blocks, &self.attributes).serialize(delta))
    }
}
