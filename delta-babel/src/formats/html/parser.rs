//! HTML parsing (HTML → document)
//!
//!     The parser is a depth-first walk over the html5ever DOM. The walk carries one
//!     [`Scope`] value: the inline attributes applied to text, the block attributes
//!     written on the next line terminator, and the enclosing list. Entering an element
//!     copies the scope, the element adjusts the copy, and leaving the element restores
//!     the saved scope, so attributes never leak out of the element that set them.
//!
//!     Block-level elements flush the open line when they start and when they end. List
//!     items, paragraphs, headings and blockquotes that produced no line at all still
//!     produce one empty line, the way the serializer writes `<p><br></p>`.
//!
//!     Dispatch order for an element: skipped tags, custom tag handlers (`tag.class`
//!     before `tag`), built-in tags and embeds, block handlers claimed by class name,
//!     custom attribute formats, then plain content.

use crate::attributes::AttributeRegistry;
use crate::blocks::table::TABLE;
use crate::blocks::{block_type_for_element, BlockRegistry, HtmlParseContext};
use crate::common::inline::{attribute_for_tag, color_attributes, parse_style};
use crate::common::slug::SlugTable;
use crate::delta::attrs::{
    ALIGN, ALT, BLOCKQUOTE, CODE_BLOCK, DIAGRAM, DIVIDER, DRAWIO, FLOAT, FOOTNOTE_REF, FORMULA,
    HEADER, HEADER_ID, HEIGHT, IMAGE, INDENT, LINK, LIST, TABLE_COL, TABLE_COL_ALIGN,
    TABLE_HEADER, TABLE_ROW, VIDEO, WIDTH,
};
use crate::delta::{Align, AttributeMap, AttributesExt, Delta, Insert, ListType, Op, BLOCK_EMBED};
use crate::formats::html::dom;
use markup5ever_rcdom::{Handle, NodeData};
use serde_json::Value;
use std::collections::HashMap;

/// Options for HTML parsing
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlParseOptions {
    /// Collapse whitespace runs and drop whitespace at line starts and ends.
    pub normalize_whitespace: bool,
}

impl Default for HtmlParseOptions {
    fn default() -> Self {
        HtmlParseOptions {
            normalize_whitespace: true,
        }
    }
}

impl HtmlParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalize_whitespace(mut self, normalize: bool) -> Self {
        self.normalize_whitespace = normalize;
        self
    }
}

/// Custom conversion for one kind of element. Returning `None` hands the element
/// back to the built-in dispatch.
pub trait TagHandler: Send + Sync {
    fn handle(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Delta>;
}

/// Tag handlers keyed by `tag` or `tag.class`.
#[derive(Default)]
pub struct TagHandlers {
    handlers: HashMap<String, Box<dyn TagHandler>>,
}

impl TagHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `selector` (`"figure"` or `"div.callout"`), replacing any
    /// handler registered for the same selector.
    pub fn register<H: TagHandler + 'static>(&mut self, selector: &str, handler: H) {
        self.handlers
            .insert(selector.to_ascii_lowercase(), Box::new(handler));
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers matching an element, class-specific selectors first.
    fn candidates(&self, tag: &str, element: &Handle) -> Vec<(String, &dyn TagHandler)> {
        let mut selectors: Vec<String> = dom::classes(element)
            .iter()
            .map(|class| format!("{tag}.{}", class.to_ascii_lowercase()))
            .collect();
        selectors.push(tag.to_string());
        selectors
            .into_iter()
            .filter_map(|selector| {
                let handler = self.handlers.get(&selector)?;
                Some((selector, handler.as_ref()))
            })
            .collect()
    }
}

/// Parse HTML into a document with the standard block handlers and attribute formats
pub fn parse_from_html(html: &str, options: &HtmlParseOptions) -> Delta {
    let blocks = BlockRegistry::with_defaults();
    let attributes = AttributeRegistry::with_defaults();
    HtmlParser::new(options, &blocks, &attributes).parse(html)
}

pub struct HtmlParser<'a> {
    options: &'a HtmlParseOptions,
    blocks: &'a BlockRegistry,
    attributes: &'a AttributeRegistry,
    tags: Option<&'a TagHandlers>,
}

impl<'a> HtmlParser<'a> {
    pub fn new(
        options: &'a HtmlParseOptions,
        blocks: &'a BlockRegistry,
        attributes: &'a AttributeRegistry,
    ) -> Self {
        HtmlParser {
            options,
            blocks,
            attributes,
            tags: None,
        }
    }

    pub fn with_tag_handlers(mut self, tags: &'a TagHandlers) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Parse an HTML document or fragment.
    pub fn parse(&self, html: &str) -> Delta {
        let dom = dom::parse(html);
        let root = dom::body(&dom).unwrap_or_else(|| dom.document.clone());
        let children = root.children.borrow().clone();
        self.parse_nodes(&children, 0)
    }

    /// Parse sibling nodes into one document. `depth` is 0 for the top-level document
    /// and grows by one for every block embed the document is nested in.
    pub fn parse_nodes(&self, nodes: &[Handle], depth: usize) -> Delta {
        let mut walker = Walker::new(self, depth);
        for node in nodes {
            walker.node(node);
        }
        walker.finish()
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    inline: AttributeMap,
    block: AttributeMap,
    list: Option<ListType>,
    /// Number of enclosing `<ul>`/`<ol>` elements.
    list_depth: usize,
    heading_id: Option<String>,
    /// Inside a simple table cell: line terminators become spaces.
    inline_only: bool,
}

struct Walker<'p, 'a> {
    parser: &'p HtmlParser<'a>,
    depth: usize,
    out: Delta,
    scope: Scope,
    slugs: SlugTable,
    /// Plain text of the open line.
    line_text: String,
    line_open: bool,
    /// Collapsed whitespace waiting for the next content, with its attributes.
    pending_space: Option<AttributeMap>,
    /// Terminators emitted so far.
    lines: usize,
}

const SKIPPED: [&str; 6] = ["script", "style", "head", "template", "title", "noscript"];

const BLOCK_TAGS: [&str; 27] = [
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "li", "main", "nav", "p", "section", "summary",
];

impl<'p, 'a> Walker<'p, 'a> {
    fn new(parser: &'p HtmlParser<'a>, depth: usize) -> Self {
        Walker {
            parser,
            depth,
            out: Delta::new(),
            scope: Scope::default(),
            slugs: SlugTable::new(),
            line_text: String::new(),
            line_open: false,
            pending_space: None,
            lines: 0,
        }
    }

    fn finish(mut self) -> Delta {
        self.flush();
        self.out
    }

    fn node(&mut self, node: &Handle) {
        match &node.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.text(&text);
            }
            NodeData::Element { .. } => self.element(node),
            NodeData::Document => self.children(node),
            _ => {}
        }
    }

    fn children(&mut self, node: &Handle) {
        let children = node.children.borrow().clone();
        for child in &children {
            self.node(child);
        }
    }

    fn text(&mut self, text: &str) {
        if !self.parser.options.normalize_whitespace {
            let text = text.replace(['\n', '\r'], " ");
            if self.line_open || !text.trim().is_empty() {
                self.push_text(&text);
            }
            return;
        }
        let mut chunk = String::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !chunk.is_empty() {
                    self.push_text(&std::mem::take(&mut chunk));
                }
                if self.line_open && self.pending_space.is_none() {
                    self.pending_space = Some(self.scope.inline.clone());
                }
            } else {
                chunk.push(ch);
            }
        }
        if !chunk.is_empty() {
            self.push_text(&chunk);
        }
    }

    fn push_pending_space(&mut self) {
        if let Some(attributes) = self.pending_space.take() {
            self.out.push(Op::text(" ", attributes));
            self.line_text.push(' ');
        }
    }

    fn push_text(&mut self, text: &str) {
        self.push_pending_space();
        self.out.push(Op::text(text, self.scope.inline.clone()));
        self.line_text.push_str(text);
        self.line_open = true;
    }

    fn push_embed(&mut self, kind: &str, value: Value, attributes: AttributeMap) {
        self.push_pending_space();
        self.out.push(Op::embed(kind, value, attributes));
        self.line_open = true;
    }

    /// Emit a line terminator carrying the current block attributes.
    fn terminate(&mut self) {
        if self.scope.inline_only {
            if self.line_open && self.pending_space.is_none() {
                self.pending_space = Some(self.scope.inline.clone());
            }
            return;
        }
        let mut attributes = self.scope.block.clone();
        if attributes.header().is_some() {
            let auto = self.slugs.unique(&self.line_text);
            if let Some(id) = &self.scope.heading_id {
                if *id != auto {
                    attributes.insert(HEADER_ID.to_string(), Value::from(id.as_str()));
                }
            }
        }
        self.pending_space = None;
        self.out.push(Op::text("\n", attributes));
        self.line_text.clear();
        self.line_open = false;
        self.lines += 1;
    }

    fn flush(&mut self) {
        if self.line_open {
            self.terminate();
        }
    }

    /// A block-level embed on a line of its own.
    fn block_embed(&mut self, kind: &str, value: Value, attributes: AttributeMap) {
        self.flush();
        self.push_embed(kind, value, attributes);
        self.terminate();
    }

    fn element(&mut self, element: &Handle) {
        let Some(tag) = dom::tag_name(element) else {
            return;
        };
        if SKIPPED.contains(&tag.as_str()) {
            return;
        }
        if self.custom(&tag, element) {
            return;
        }

        match tag.as_str() {
            "br" => {
                self.terminate();
                return;
            }
            "hr" => {
                self.block_embed(DIVIDER, Value::Bool(true), AttributeMap::new());
                return;
            }
            "img" => {
                self.image(element);
                return;
            }
            "video" => {
                self.video(element);
                return;
            }
            "pre" => {
                self.pre(element);
                return;
            }
            "table" => {
                self.table(element);
                return;
            }
            "input" => return,
            "sup" if dom::has_class(element, "footnote-ref") => {
                let id = footnote_ref_id(element);
                self.push_embed(FOOTNOTE_REF, Value::from(id), AttributeMap::new());
                return;
            }
            "a" if dom::has_class(element, "footnote-backref") => return,
            "span" => {
                if let Some(latex) = dom::attr(element, "data-formula") {
                    self.push_embed(FORMULA, Value::from(latex), self.scope.inline.clone());
                    return;
                }
                if let Some(kind) = dom::attr(element, "data-embed") {
                    let raw = dom::attr(element, "data-value").unwrap_or_default();
                    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                    self.push_embed(&kind, value, AttributeMap::new());
                    return;
                }
            }
            "div" if dom::has_class(element, "drawio") => {
                let src = dom::attr(element, "data-src").unwrap_or_default();
                self.block_embed(DRAWIO, Value::from(src), AttributeMap::new());
                return;
            }
            _ => {}
        }

        if let Some(block_type) = block_type_for_element(element) {
            if self.block(block_type, element) {
                return;
            }
        }

        match tag.as_str() {
            "ul" | "ol" => self.list(&tag, element),
            "li" => self.list_item(element),
            _ if BLOCK_TAGS.contains(&tag.as_str()) => self.block_element(&tag, element),
            _ => self.inline_element(&tag, element),
        }
    }

    /// Custom tag handlers, class-specific selectors first.
    fn custom(&mut self, tag: &str, element: &Handle) -> bool {
        let Some(tags) = self.parser.tags.filter(|tags| !tags.is_empty()) else {
            return false;
        };
        let parser = self.parser;
        let depth = self.depth + 1;
        let parse = |nodes: &[Handle]| parser.parse_nodes(nodes, depth);
        let ctx = HtmlParseContext::new(parser.options, depth, &parse);
        for (selector, handler) in tags.candidates(tag, element) {
            if let Some(delta) = handler.handle(element, &ctx) {
                tracing::debug!(tag, selector = %selector, "custom tag handler converted element");
                self.flush();
                self.line_open = ends_open(&delta);
                self.out.extend(delta);
                return true;
            }
        }
        false
    }

    /// Element claimed by a block handler. `false` means the element is plain content.
    fn block(&mut self, block_type: &str, element: &Handle) -> bool {
        if !self.parser.blocks.has(block_type) {
            return false;
        }
        let parser = self.parser;
        let depth = self.depth + 1;
        let parse = |nodes: &[Handle]| parser.parse_nodes(nodes, depth);
        let ctx = HtmlParseContext::new(parser.options, depth, &parse);
        match parser.blocks.parse_html(block_type, element, &ctx) {
            Some(data) => {
                self.block_embed(BLOCK_EMBED, data, AttributeMap::new());
                true
            }
            None => false,
        }
    }

    fn block_element(&mut self, tag: &str, element: &Handle) {
        self.flush();
        let saved = self.scope.clone();
        let lines = self.lines;

        if let Some(level) = heading_level(tag) {
            self.scope.block.insert(HEADER.to_string(), Value::from(level));
            self.scope.heading_id = dom::attr(element, "id");
        }
        if tag == "blockquote" {
            self.scope.block.insert(BLOCKQUOTE.to_string(), Value::Bool(true));
        }
        if matches!(tag, "p" | "blockquote" | "div") || heading_level(tag).is_some() {
            self.block_style(element);
        }

        self.children(element);
        self.flush();
        let needs_line = matches!(tag, "p" | "blockquote") || heading_level(tag).is_some();
        if needs_line && self.lines == lines {
            self.terminate();
        }
        self.scope = saved;
    }

    /// `text-align` and `margin-left` of a block element.
    fn block_style(&mut self, element: &Handle) {
        let Some(style) = dom::attr(element, "style") else {
            return;
        };
        for (property, value) in parse_style(&style) {
            match property.as_str() {
                "text-align" => {
                    if let Some(align) = Align::parse(&value).filter(|a| *a != Align::Left) {
                        self.scope
                            .block
                            .insert(ALIGN.to_string(), Value::from(align.as_str()));
                    }
                }
                "margin-left" => {
                    let indent = value
                        .strip_suffix("em")
                        .and_then(|n| n.trim().parse::<f64>().ok())
                        .map(|em| (em / 2.0).round() as i64)
                        .unwrap_or(0);
                    if indent > 0 {
                        self.scope.block.insert(INDENT.to_string(), Value::from(indent));
                    }
                }
                _ => {}
            }
        }
    }

    fn list(&mut self, tag: &str, element: &Handle) {
        self.flush();
        let saved = self.scope.clone();
        self.scope.list = Some(match tag {
            "ol" => ListType::Ordered,
            _ => checked_state(element).unwrap_or(ListType::Bullet),
        });
        self.scope.list_depth += 1;
        self.children(element);
        self.flush();
        self.scope = saved;
    }

    fn list_item(&mut self, element: &Handle) {
        self.flush();
        let saved = self.scope.clone();
        let lines = self.lines;

        let kind = checked_state(element)
            .or_else(|| checkbox_state(element))
            .or(self.scope.list)
            .unwrap_or(ListType::Bullet);
        let indent = self.scope.list_depth.saturating_sub(1);
        let block = &mut self.scope.block;
        block.remove(HEADER);
        block.insert(LIST.to_string(), Value::from(kind.as_str()));
        if indent > 0 {
            block.insert(INDENT.to_string(), Value::from(indent));
        } else {
            block.remove(INDENT);
        }
        if let Some(align) = dom::style_value(element, "text-align")
            .and_then(|v| Align::parse(&v))
            .filter(|a| *a != Align::Left)
        {
            block.insert(ALIGN.to_string(), Value::from(align.as_str()));
        }

        self.children(element);
        self.flush();
        if self.lines == lines {
            self.terminate();
        }
        self.scope = saved;
    }

    fn inline_element(&mut self, tag: &str, element: &Handle) {
        let saved = self.scope.inline.clone();
        let inline = &mut self.scope.inline;

        if let Some((key, value)) = attribute_for_tag(tag) {
            inline.insert(key.to_string(), value);
        }
        if tag == "a" {
            if let Some(href) = dom::attr(element, "href") {
                inline.insert(LINK.to_string(), Value::from(href));
            }
        }
        if tag == "span" || tag == "font" {
            if let Some(style) = dom::attr(element, "style") {
                for (key, value) in color_attributes(&style) {
                    inline.insert(key.to_string(), Value::from(value));
                }
            }
        }
        let attribute = |name: &str| dom::attr(element, name);
        for format in self.parser.attributes.formats() {
            if let Some(value) = format.match_element(tag, &attribute) {
                inline.insert(format.name().to_string(), value);
            }
        }

        self.children(element);
        self.scope.inline = saved;
    }

    fn image(&mut self, element: &Handle) {
        let Some(src) = dom::attr(element, "src") else {
            return;
        };
        let mut attributes = AttributeMap::new();
        if let Some(alt) = dom::attr(element, "alt").filter(|alt| !alt.is_empty()) {
            attributes.insert(ALT.to_string(), Value::from(alt));
        }
        for key in [WIDTH, HEIGHT] {
            if let Some(value) = dom::attr(element, key) {
                let value = value
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or(Value::String(value));
                attributes.insert(key.to_string(), value);
            }
        }
        if let Some(float) = dom::style_value(element, "float").filter(|f| f != "none") {
            attributes.insert(FLOAT.to_string(), Value::from(float));
        }
        if let Some(link) = self.scope.inline.get(LINK) {
            attributes.insert(LINK.to_string(), link.clone());
        }
        self.push_embed(IMAGE, Value::from(src), attributes);
    }

    fn video(&mut self, element: &Handle) {
        let src = dom::attr(element, "src").or_else(|| {
            dom::children_named(element, "source")
                .iter()
                .find_map(|source| dom::attr(source, "src"))
        });
        if let Some(src) = src {
            self.block_embed(VIDEO, Value::from(src), AttributeMap::new());
        }
    }

    fn pre(&mut self, element: &Handle) {
        self.flush();
        let text = dom::text_content(element);
        if dom::has_class(element, "mermaid") {
            self.block_embed(DIAGRAM, Value::from(text), AttributeMap::new());
            return;
        }

        let language = dom::attr(element, "data-language").or_else(|| {
            dom::children_named(element, "code").iter().find_map(|code| {
                dom::classes(code)
                    .iter()
                    .find_map(|c| c.strip_prefix("language-").map(str::to_string))
            })
        });
        let code_block = match language {
            Some(language) if !language.is_empty() => Value::from(language),
            _ => Value::Bool(true),
        };

        let saved = self.scope.clone();
        self.scope.inline = AttributeMap::new();
        self.scope.block = AttributeMap::new();
        self.scope.block.insert(CODE_BLOCK.to_string(), code_block);
        for line in text.split('\n') {
            if !line.is_empty() {
                self.out.push(Op::text(line, AttributeMap::new()));
            }
            self.terminate();
        }
        self.scope = saved;
    }

    fn table(&mut self, element: &Handle) {
        if self.block(TABLE, element) {
            return;
        }
        tracing::debug!(depth = self.depth, "parsing table as a simple table");
        self.flush();
        let saved = self.scope.clone();

        for (row, tr) in table_rows(element).iter().enumerate() {
            let cells = dom::element_children(tr)
                .into_iter()
                .filter(|cell| matches!(dom::tag_name(cell).as_deref(), Some("td" | "th")));
            for (col, cell) in cells.enumerate() {
                let mut block = AttributeMap::new();
                block.insert(TABLE_ROW.to_string(), Value::from(row));
                block.insert(TABLE_COL.to_string(), Value::from(col));
                if dom::tag_name(&cell).as_deref() == Some("th") {
                    block.insert(TABLE_HEADER.to_string(), Value::Bool(true));
                }
                if let Some(align) = dom::style_value(&cell, "text-align")
                    .and_then(|v| Align::parse(&v))
                    .filter(|a| *a != Align::Left)
                {
                    block.insert(TABLE_COL_ALIGN.to_string(), Value::from(align.as_str()));
                }

                self.scope.block = block;
                self.scope.inline_only = true;
                self.children(&cell);
                self.scope.inline_only = false;
                self.terminate();
            }
        }

        self.scope = saved;
    }
}

/// `<tr>` elements of a table in document order, through `thead`/`tbody`/`tfoot`.
fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    for child in dom::element_children(table) {
        match dom::tag_name(&child).as_deref() {
            Some("tr") => rows.push(child),
            Some("thead" | "tbody" | "tfoot") => rows.extend(dom::children_named(&child, "tr")),
            _ => {}
        }
    }
    rows
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag.as_bytes() {
        [b'h', level @ b'1'..=b'6'] => Some(level - b'0'),
        _ => None,
    }
}

/// Task list state from `data-checked`.
fn checked_state(element: &Handle) -> Option<ListType> {
    match dom::attr(element, "data-checked")?.as_str() {
        "true" => Some(ListType::Checked),
        "false" => Some(ListType::Unchecked),
        _ => None,
    }
}

/// Task list state from a leading `<input type="checkbox">`, as GitHub renders it.
fn checkbox_state(item: &Handle) -> Option<ListType> {
    let input = dom::element_children(item).into_iter().next()?;
    let is_checkbox = dom::tag_name(&input).as_deref() == Some("input")
        && dom::attr(&input, "type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
    if !is_checkbox {
        return None;
    }
    Some(if dom::attr(&input, "checked").is_some() {
        ListType::Checked
    } else {
        ListType::Unchecked
    })
}

/// Footnote id of a `<sup class="footnote-ref">`, from its link target or its text.
fn footnote_ref_id(sup: &Handle) -> String {
    dom::children_named(sup, "a")
        .iter()
        .find_map(|a| {
            dom::attr(a, "href")
                .and_then(|href| href.strip_prefix("#fn-").map(str::to_string))
        })
        .unwrap_or_else(|| dom::text_content(sup).trim().to_string())
}

/// Whether a delta leaves its last line unterminated.
fn ends_open(delta: &Delta) -> bool {
    match delta.ops.last().and_then(|op| op.insert.as_ref()) {
        Some(Insert::Text(text)) => !text.ends_with('\n'),
        Some(Insert::Embed(_)) => true,
        None => false,
    }
}
