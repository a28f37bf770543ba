//! HTML format implementation
//!
//! Bidirectional conversion between the document model and HTML5.
//!
//! # Library Choice
//!
//! Parsing uses the `html5ever` + `markup5ever_rcdom` pair: a browser-grade, WHATWG
//! compliant parser that handles malformed HTML gracefully. Output is written as a string
//! rather than through an `RcDom`, because block handlers contribute ready-made HTML
//! fragments. `html-escape` does the text and attribute escaping.
//!
//! # Element Mapping Table
//!
//! | Document                 | HTML                                                   |
//! |--------------------------|--------------------------------------------------------|
//! | paragraph line           | `<p>`                                                  |
//! | `header: N`              | `<hN id="…">` (id when anchor links are on)            |
//! | `blockquote`             | `<blockquote>`, one per line                           |
//! | `list` + `indent`        | nested `<ol>`/`<ul>`, `<ul data-checked>` for tasks    |
//! | `code-block: L`          | `<pre data-language="L"><code class="language-L">`     |
//! | `table-row`/`table-col`  | `<table>` with `th` for header rows                    |
//! | `align`, `indent`        | `style="text-align: X; margin-left: {2n}em"`           |
//! | inline formats           | `strong em u s code sub/sup mark kbd`, `a`, style span |
//! | `image`, `video`         | `<img>`, `<video controls>`                            |
//! | `formula`                | `<span class="formula" data-formula>`                  |
//! | `divider`                | `<hr>`                                                 |
//! | `footnote-ref`           | `<sup class="footnote-ref"><a href="#fn-ID">`          |
//! | `diagram`, `drawio`      | `<pre class="mermaid">`, `<div class="drawio">`        |
//! | `block`                  | the registered block handler's markup                  |
//! | unknown embed            | `<span data-embed data-value>` placeholder             |
//!
//! # Lossy Conversions
//!
//! - Whitespace is normalized on import unless `normalize_whitespace` is off.
//! - With the `table` handler registered every `<table>` imports as an Extended Table
//!   block; simple table lines come back only when the handler is absent.
//! - Attributes without an HTML trace (e.g. a left alignment) are dropped.

pub mod dom;
mod parser;
mod serializer;

pub use parser::{parse_from_html, HtmlParseOptions, HtmlParser, TagHandler, TagHandlers};
pub use serializer::{serialize_to_html, HtmlOptions, HtmlSerializer, WidthUnit};

use crate::attributes::AttributeRegistry;
use crate::blocks::BlockRegistry;
use crate::delta::Delta;
use crate::error::FormatError;
use crate::format::{bool_option, invalid_option, Format};
use std::collections::HashMap;

/// Format implementation for HTML
#[derive(Default)]
pub struct HtmlFormat {
    options: HtmlOptions,
    parse_options: HtmlParseOptions,
    blocks: BlockRegistry,
    attributes: AttributeRegistry,
}

impl HtmlFormat {
    pub fn new(options: HtmlOptions) -> Self {
        HtmlFormat {
            options,
            ..Default::default()
        }
    }

    pub fn with_parse_options(mut self, options: HtmlParseOptions) -> Self {
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

    /// The format's options with string-keyed overrides applied.
    fn options_with(&self, overrides: &HashMap<String, String>) -> Result<HtmlOptions, FormatError> {
        let mut options = self.options.clone();
        for (key, value) in overrides {
            if !apply_option(&mut options, key, value)? {
                return Err(invalid_option(key, value));
            }
        }
        Ok(options)
    }
}

/// Apply one string-keyed HTML option. `Ok(false)` when `key` is not an HTML option.
pub(crate) fn apply_option(
    options: &mut HtmlOptions,
    key: &str,
    value: &str,
) -> Result<bool, FormatError> {
    match key {
        "pretty" => options.pretty = bool_option(key, value)?,
        "wrapper" => {
            options.wrapper = Some(value.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
        }
        "anchor-links" => options.anchor_links = bool_option(key, value)?,
        "hierarchical-numbering" => options.hierarchical_numbering = bool_option(key, value)?,
        "table-width" => {
            options.table_width = WidthUnit::parse(value).ok_or_else(|| invalid_option(key, value))?
        }
        "sanitize" => options.sanitize = bool_option(key, value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

impl Format for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn description(&self) -> &str {
        "HTML5 fragments"
    }

    fn file_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Delta, FormatError> {
        Ok(HtmlParser::new(&self.parse_options, &self.blocks, &self.attributes).parse(source))
    }

    fn serialize(&self, delta: &Delta) -> Result<String, FormatError> {
        Ok(HtmlSerializer::new(&self.options, &self.blocks, &self.attributes).serialize(delta))
    }

    fn serialize_with_options(
        &self,
        delta: &Delta,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        let options = self.options_with(options)?;
        Ok(HtmlSerializer::new(&options, &self.blocks, &self.attributes).serialize(delta))
    }
}
