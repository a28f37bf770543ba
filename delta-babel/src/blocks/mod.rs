//! Block Handler Registry
//!
//! Block embeds (`{"block": {"type": ..., ...}}`) are structures the line model cannot
//! express: a table with merged cells, a callout, a multi-column layout. Each block type
//! is owned by one [`BlockHandler`], and the converters look handlers up by type name in
//! a [`BlockRegistry`].
//!
//! # The handler contract
//!
//! A handler validates its block data, renders it to HTML (and optionally Markdown),
//! and recognizes its HTML form when parsing. Handlers never call the converters
//! directly. Each call receives a context built by the converter with exactly one
//! callback (render a nested document, or parse nested nodes), so the handler layer and
//! the converter layer do not depend on each other.
//!
//! # Failure modes
//!
//! Nothing a handler does can fail a conversion. An unknown block type, a `validate`
//! rejection, or a missing handler means the block is skipped when emitting, and the
//! element's children are processed as plain content when parsing. Nested documents
//! deeper than [`MAX_NESTING_DEPTH`] are treated the same way.
//!
//! # Standard handlers
//!
//! *   `table`: the Extended Table (merged cells, widths, alignment).
//! *   `alert`: GitHub-style callouts.
//! *   `footnotes`: the collected footnote definitions of a document.
//! *   `columns`: N-column layout.
//! *   `inline-box`: a floating container.

use crate::delta::{Delta, MAX_NESTING_DEPTH};
use crate::error::FormatError;
use crate::formats::html::dom;
use crate::formats::html::{HtmlOptions, HtmlParseOptions};
use crate::formats::markdown::MarkdownOptions;
use markup5ever_rcdom::Handle;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub mod alert;
pub mod columns;
pub mod footnotes;
pub mod inline_box;
pub mod table;

/// Discriminator key of every block payload.
pub const TYPE_KEY: &str = "type";

/// Context handed to [`BlockHandler::to_html`].
pub struct HtmlRenderContext<'a> {
    pub options: &'a HtmlOptions,
    /// Depth of the block's nested documents (1 for blocks of the top-level document).
    pub depth: usize,
    render: &'a dyn Fn(&Delta) -> String,
}

impl<'a> HtmlRenderContext<'a> {
    pub fn new(options: &'a HtmlOptions, depth: usize, render: &'a dyn Fn(&Delta) -> String) -> Self {
        HtmlRenderContext {
            options,
            depth,
            render,
        }
    }

    /// Render a nested document to HTML.
    pub fn render_delta(&self, delta: &Delta) -> String {
        (self.render)(delta)
    }
}

/// Context handed to [`BlockHandler::to_markdown`].
pub struct MarkdownRenderContext<'a> {
    pub options: &'a MarkdownOptions,
    /// Depth of the block's nested documents.
    pub depth: usize,
    render: &'a dyn Fn(&Delta) -> String,
}

impl<'a> MarkdownRenderContext<'a> {
    pub fn new(
        options: &'a MarkdownOptions,
        depth: usize,
        render: &'a dyn Fn(&Delta) -> String,
    ) -> Self {
        MarkdownRenderContext {
            options,
            depth,
            render,
        }
    }

    /// Render a nested document to Markdown.
    pub fn render_delta(&self, delta: &Delta) -> String {
        (self.render)(delta)
    }
}

/// Context handed to [`BlockHandler::from_html`].
pub struct HtmlParseContext<'a> {
    pub options: &'a HtmlParseOptions,
    /// Depth of the nested documents the callback produces.
    pub depth: usize,
    parse: &'a dyn Fn(&[Handle]) -> Delta,
}

impl<'a> HtmlParseContext<'a> {
    pub fn new(
        options: &'a HtmlParseOptions,
        depth: usize,
        parse: &'a dyn Fn(&[Handle]) -> Delta,
    ) -> Self {
        HtmlParseContext {
            options,
            depth,
            parse,
        }
    }

    /// Parse a list of sibling nodes into a nested document.
    pub fn parse_nodes(&self, nodes: &[Handle]) -> Delta {
        (self.parse)(nodes)
    }

    /// Parse the children of `element` into a nested document. An element without
    /// content yields one empty line.
    pub fn parse_children(&self, element: &Handle) -> Delta {
        let children = element.children.borrow().clone();
        let delta = self.parse_nodes(&children);
        if delta.is_empty() {
            Delta::empty_line()
        } else {
            delta
        }
    }
}

/// A handler for one block embed type.
pub trait BlockHandler: Send + Sync {
    /// The block type this handler owns (the `type` field of the payload).
    fn block_type(&self) -> &str;

    fn validate(&self, data: &Value) -> bool;

    /// Render valid block data to HTML.
    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String>;

    /// Recognize `element` and return block data, or `None` to let the parser treat
    /// the element as plain content.
    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value>;

    /// Markdown form of the block. `None` means there is no lossless Markdown form and
    /// the emitter falls back to [`BlockHandler::to_html`].
    fn to_markdown(&self, _data: &Value, _ctx: &MarkdownRenderContext) -> Option<String> {
        None
    }

    fn normalize(&self, data: Value) -> Value {
        data
    }

    /// Every nested document owned by the block, in a stable order.
    fn nested_deltas(&self, data: &Value) -> Vec<Delta>;

    /// Replace the nested documents, in the order [`BlockHandler::nested_deltas`]
    /// returned them.
    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value;
}

/// Name-keyed table of block handlers.
pub struct BlockRegistry {
    handlers: HashMap<String, Box<dyn BlockHandler>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        BlockRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the five standard handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let standard: [Box<dyn BlockHandler>; 5] = [
            Box::new(table::TableHandler),
            Box::new(alert::AlertHandler),
            Box::new(footnotes::FootnotesHandler),
            Box::new(columns::ColumnsHandler),
            Box::new(inline_box::InlineBoxHandler),
        ];
        for handler in standard {
            let block_type = handler.block_type().to_string();
            registry.handlers.insert(block_type, handler);
        }
        registry
    }

    /// Register a handler. Registering a type name twice is an error.
    pub fn register<H: BlockHandler + 'static>(&mut self, handler: H) -> Result<(), FormatError> {
        let block_type = handler.block_type().to_string();
        if self.handlers.contains_key(&block_type) {
            return Err(FormatError::DuplicateBlockHandler(block_type));
        }
        self.handlers.insert(block_type, Box::new(handler));
        Ok(())
    }

    pub fn get(&self, block_type: &str) -> Option<&dyn BlockHandler> {
        self.handlers.get(block_type).map(|h| h.as_ref())
    }

    pub fn has(&self, block_type: &str) -> bool {
        self.handlers.contains_key(block_type)
    }

    /// All registered block types (sorted)
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Handler for a block payload, provided the payload names a registered type and
    /// passes that handler's validation.
    pub fn resolve(&self, data: &Value, depth: usize) -> Option<&dyn BlockHandler> {
        let Some(block_type) = block_type_of(data) else {
            tracing::warn!("skipping block embed without a type");
            return None;
        };
        if depth > MAX_NESTING_DEPTH {
            tracing::warn!(block_type, depth, "skipping block nested too deeply");
            return None;
        }
        let Some(handler) = self.get(block_type) else {
            tracing::warn!(block_type, "skipping block with no registered handler");
            return None;
        };
        if !handler.validate(data) {
            tracing::warn!(block_type, "skipping block that failed validation");
            return None;
        }
        Some(handler)
    }

    pub fn render_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        self.resolve(data, ctx.depth)?.to_html(data, ctx)
    }

    /// HTML element to block data, for elements recognized by a registered handler.
    pub fn parse_html(
        &self,
        block_type: &str,
        element: &Handle,
        ctx: &HtmlParseContext,
    ) -> Option<Value> {
        if ctx.depth > MAX_NESTING_DEPTH {
            tracing::warn!(block_type, depth = ctx.depth, "flattening block nested too deeply");
            return None;
        }
        let handler = self.get(block_type)?;
        let data = handler.from_html(element, ctx)?;
        Some(handler.normalize(data))
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The `type` field of a block payload.
pub fn block_type_of(data: &Value) -> Option<&str> {
    data.get(TYPE_KEY).and_then(Value::as_str)
}

/// Block type claimed by an element through its tag and class names, for the
/// standard handlers.
pub fn block_type_for_element(element: &Handle) -> Option<&'static str> {
    let tag = dom::tag_name(element)?;
    if tag == "table" {
        return Some(table::TABLE);
    }
    if !matches!(tag.as_str(), "div" | "section" | "aside") {
        return None;
    }
    let classes = dom::classes(element);
    if classes.iter().any(|c| c.starts_with("markdown-alert")) {
        Some(alert::ALERT)
    } else if classes.iter().any(|c| c == "columns") {
        Some(columns::COLUMNS)
    } else if classes.iter().any(|c| c == "inline-box") {
        Some(inline_box::INLINE_BOX)
    } else if classes.iter().any(|c| c == "footnotes") {
        Some(footnotes::FOOTNOTES)
    } else {
        None
    }
}

/// Malformed block data. Never leaves this module tree: a failing payload is skipped.
#[derive(Debug, Error, PartialEq)]
pub enum BlockDataError {
    #[error("block data is not an object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{0}'")]
    InvalidField(&'static str),
    #[error("malformed cell key '{0}'")]
    MalformedKey(String),
    #[error("{0}")]
    Grid(String),
}

/// Object fields of a block payload.
pub(crate) fn fields(data: &Value) -> Result<&Map<String, Value>, BlockDataError> {
    data.as_object().ok_or(BlockDataError::NotAnObject)
}

/// A nested document stored under `key`.
pub(crate) fn nested_delta(
    map: &Map<String, Value>,
    key: &'static str,
) -> Result<Delta, BlockDataError> {
    let value = map.get(key).ok_or(BlockDataError::MissingField(key))?;
    Delta::from_value(value).ok_or(BlockDataError::InvalidField(key))
}

/// Start a block payload with its type discriminator.
pub(crate) fn block_payload(block_type: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Value::from(block_type));
    map
}

/// Parse a CSS length list entry such as `50%` or `120px` into its number.
pub(crate) fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value
        .strip_suffix('%')
        .or_else(|| value.strip_suffix("px"))
        .unwrap_or(value);
    number.trim().parse().ok()
}
