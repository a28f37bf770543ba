//! Markdown parsing (Markdown → document)
//!
//! Pipeline: preprocessing → comrak AST → [`Builder`] walk → Delta.
//!
//! The walk is a node-kind dispatch. Block attributes (blockquote, list) and inline
//! attributes (bold, link, ...) are handed down by value, so nothing has to be undone on
//! the way back up. Raw HTML blocks are parsed by the HTML parser, footnote definitions
//! are collected and emitted as one `footnotes` block at the end of the document.

use super::inline_html::{classify, InlineTag, TagStack};
use super::preprocess::{preprocess, BREAK_SENTINEL};
use super::serializer::DiagramMode;
use crate::attributes::AttributeRegistry;
use crate::blocks::alert::{AlertData, AlertType, ALERT};
use crate::blocks::footnotes::{Footnote, FootnotesData, FOOTNOTES};
use crate::blocks::table::{CellPos, TableCell, TableData, TABLE};
use crate::blocks::BlockRegistry;
use crate::delta::attrs::{
    ALT, BLOCKQUOTE, BOLD, CODE, CODE_BLOCK, DIAGRAM, DIVIDER, FOOTNOTE_REF, FORMULA, HEADER,
    HEADER_ID, IMAGE, INDENT, ITALIC, LINK, LIST, STRIKE, TABLE_COL, TABLE_COL_ALIGN,
    TABLE_HEADER, TABLE_ROW,
};
use crate::delta::{Align, AttributeMap, Delta, Insert, ListType, Op, BLOCK_EMBED, MAX_NESTING_DEPTH};
use crate::formats::html::{dom, HtmlParseOptions, HtmlParser};
use comrak::nodes::{AstNode, ListType as ComrakListType, NodeCodeBlock, NodeValue, TableAlignment};
use comrak::{parse_document, Arena, ComrakOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

pub(super) static HEADING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\{#([A-Za-z0-9_:.-]+)\}[ \t]*$").expect("valid heading id regex"));
static ALERT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[!([A-Za-z]+)\]$").expect("valid alert marker regex"));

/// Options for Markdown parsing
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownParseOptions {
    /// Read a paragraph holding only `$x$` as display math.
    pub promote_display_math: bool,
    /// `Embed` turns fenced `mermaid` blocks into `diagram` embeds.
    pub diagram: DiagramMode,
    /// Options for raw HTML blocks.
    pub html: HtmlParseOptions,
}

impl Default for MarkdownParseOptions {
    fn default() -> Self {
        MarkdownParseOptions {
            promote_display_math: true,
            diagram: DiagramMode::Embed,
            html: HtmlParseOptions::default(),
        }
    }
}

impl MarkdownParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_promote_display_math(mut self, promote: bool) -> Self {
        self.promote_display_math = promote;
        self
    }

    pub fn with_diagram(mut self, diagram: DiagramMode) -> Self {
        self.diagram = diagram;
        self
    }

    pub fn with_html(mut self, html: HtmlParseOptions) -> Self {
        self.html = html;
        self
    }
}

/// Parse Markdown with the standard block handlers and attribute formats
pub fn parse_from_markdown(source: &str, options: &MarkdownParseOptions) -> Delta {
    let blocks = BlockRegistry::with_defaults();
    let attributes = AttributeRegistry::with_defaults();
    MarkdownParser::new(options, &blocks, &attributes).parse(source)
}

fn comrak_options() -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.math_dollars = true;
    options
}

/// A Markdown parser. The comrak option set is built once and reused for every call.
pub struct MarkdownParser<'a> {
    options: &'a MarkdownParseOptions,
    blocks: &'a BlockRegistry,
    attributes: &'a AttributeRegistry,
    comrak: ComrakOptions<'static>,
}

impl<'a> MarkdownParser<'a> {
    pub fn new(
        options: &'a MarkdownParseOptions,
        blocks: &'a BlockRegistry,
        attributes: &'a AttributeRegistry,
    ) -> Self {
        MarkdownParser {
            options,
            blocks,
            attributes,
            comrak: comrak_options(),
        }
    }

    pub fn parse(&self, source: &str) -> Delta {
        let source = preprocess(source, self.options.promote_display_math);
        let arena = Arena::new();
        let root = parse_document(&arena, &source, &self.comrak);

        let mut builder = Builder::new(self, &source, 0);
        builder.children(root, &Scope::default());
        builder.finish()
    }
}

/// Block context of the node being walked.
#[derive(Debug, Clone, Default)]
struct Scope {
    block: AttributeMap,
    list_depth: usize,
}

/// Accumulates one document. Nested documents (alert content, table cells, footnote
/// bodies) get a builder of their own one level deeper.
struct Builder<'p, 'a> {
    parser: &'p MarkdownParser<'a>,
    /// Preprocessed source the AST was built from.
    source: &'p str,
    depth: usize,
    delta: Delta,
    footnotes: Vec<Footnote>,
}

impl<'p, 'a> Builder<'p, 'a> {
    fn new(parser: &'p MarkdownParser<'a>, source: &'p str, depth: usize) -> Self {
        Builder {
            parser,
            source,
            depth,
            delta: Delta::new(),
            footnotes: Vec::new(),
        }
    }

    fn finish(mut self) -> Delta {
        if self.footnotes.is_empty() {
            return self.delta;
        }
        let items = std::mem::take(&mut self.footnotes);
        match self.parser.blocks.get(FOOTNOTES) {
            Some(handler) => {
                let data = handler.normalize(FootnotesData { items }.to_value());
                self.push_embed(BLOCK_EMBED, data, AttributeMap::new());
                self.push_newline(&AttributeMap::new());
            }
            None => {
                tracing::debug!(count = items.len(), "writing footnotes as plain content");
                for note in items {
                    self.delta.extend(note.content);
                }
            }
        }
        self.delta
    }

    /// A nested document, one empty line when nothing was produced.
    fn nested(self) -> Delta {
        let delta = self.finish();
        if delta.is_empty() {
            Delta::empty_line()
        } else {
            delta
        }
    }

    fn push_text(&mut self, text: &str, attributes: &AttributeMap) {
        self.delta.push(Op::text(text, attributes.clone()));
    }

    fn push_embed(&mut self, kind: &str, value: Value, attributes: AttributeMap) {
        self.delta.push(Op::embed(kind, value, attributes));
    }

    fn push_newline(&mut self, block: &AttributeMap) {
        self.delta.push(Op::text("\n", block.clone()));
    }

    fn children<'n>(&mut self, node: &'n AstNode<'n>, scope: &Scope) {
        for child in node.children() {
            self.block(child, scope);
        }
    }

    fn block<'n>(&mut self, node: &'n AstNode<'n>, scope: &Scope) {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Paragraph => {
                self.inlines(node.children(), &AttributeMap::new(), &scope.block);
                self.push_newline(&scope.block);
            }
            NodeValue::Heading(heading) => {
                let mut block = scope.block.clone();
                block.insert(HEADER.to_string(), Value::from(heading.level));
                self.inlines(node.children(), &AttributeMap::new(), &block);
                let last_line = if heading.setext {
                    data.sourcepos.end.line.saturating_sub(1)
                } else {
                    data.sourcepos.start.line
                };
                let explicit_id = source_line(self.source, last_line).is_some_and(has_trailing_id);
                if let Some(id) = explicit_id.then(|| self.take_heading_id()).flatten() {
                    block.insert(HEADER_ID.to_string(), Value::from(id));
                }
                self.push_newline(&block);
            }
            NodeValue::BlockQuote => match self.alert(node) {
                Some(alert) => {
                    self.push_embed(BLOCK_EMBED, alert, AttributeMap::new());
                    self.push_newline(&scope.block);
                }
                None => {
                    let mut inner = scope.clone();
                    inner.block.insert(BLOCKQUOTE.to_string(), Value::Bool(true));
                    self.children(node, &inner);
                }
            },
            NodeValue::List(_) => {
                let inner = Scope {
                    block: scope.block.clone(),
                    list_depth: scope.list_depth + 1,
                };
                self.children(node, &inner);
            }
            NodeValue::Item(list) => {
                let kind = match list.list_type {
                    ComrakListType::Ordered => ListType::Ordered,
                    ComrakListType::Bullet => ListType::Bullet,
                };
                self.item(node, kind, scope);
            }
            NodeValue::TaskItem(symbol) => {
                let kind = match symbol {
                    Some(c) if !c.is_whitespace() => ListType::Checked,
                    _ => ListType::Unchecked,
                };
                self.item(node, kind, scope);
            }
            NodeValue::CodeBlock(code) => self.code_block(code, scope),
            NodeValue::HtmlBlock(html) => self.html_block(&html.literal, scope),
            NodeValue::ThematicBreak => {
                self.push_embed(DIVIDER, Value::Bool(true), AttributeMap::new());
                self.push_newline(&scope.block);
            }
            NodeValue::Table(table) => self.table(node, &table.alignments, scope),
            NodeValue::FootnoteDefinition(definition) => {
                let mut body = Builder::new(self.parser, self.source, self.depth + 1);
                body.children(node, &Scope::default());
                self.footnotes.push(Footnote {
                    id: definition.name.clone(),
                    content: body.nested(),
                });
            }
            _ => self.children(node, scope),
        }
    }

    fn item<'n>(&mut self, node: &'n AstNode<'n>, kind: ListType, scope: &Scope) {
        let mut block = scope.block.clone();
        block.insert(LIST.to_string(), Value::from(kind.as_str()));
        let indent = scope.list_depth.saturating_sub(1);
        if indent > 0 {
            block.insert(INDENT.to_string(), Value::from(indent));
        }

        if node.first_child().is_none() {
            self.push_newline(&block);
            return;
        }
        for child in node.children() {
            let is_paragraph = matches!(child.data.borrow().value, NodeValue::Paragraph);
            if is_paragraph {
                self.inlines(child.children(), &AttributeMap::new(), &block);
                self.push_newline(&block);
            } else {
                self.block(child, scope);
            }
        }
    }

    fn code_block(&mut self, code: &NodeCodeBlock, scope: &Scope) {
        let language = code.info.split_whitespace().next().unwrap_or_default();
        let literal = code.literal.strip_suffix('\n').unwrap_or(&code.literal);

        if language == "mermaid" && self.parser.options.diagram == DiagramMode::Embed {
            self.push_embed(DIAGRAM, Value::from(literal), AttributeMap::new());
            self.push_newline(&scope.block);
            return;
        }

        let mut block = AttributeMap::new();
        let value = if language.is_empty() {
            Value::Bool(true)
        } else {
            Value::from(language)
        };
        block.insert(CODE_BLOCK.to_string(), value);
        for line in literal.split('\n') {
            self.push_text(line, &AttributeMap::new());
            self.push_newline(&block);
        }
    }

    fn html_block(&mut self, html: &str, scope: &Scope) {
        if html.trim() == BREAK_SENTINEL {
            self.push_newline(&scope.block);
            return;
        }
        let document = dom::parse(html);
        let root = dom::body(&document).unwrap_or_else(|| document.document.clone());
        let nodes = root.children.borrow().clone();
        let parser = HtmlParser::new(
            &self.parser.options.html,
            self.parser.blocks,
            self.parser.attributes,
        );
        self.delta.extend(parser.parse_nodes(&nodes, self.depth));
    }

    /// A blockquote whose first line is `[!TYPE]`, as alert block data.
    fn alert<'n>(&self, node: &'n AstNode<'n>) -> Option<Value> {
        let handler = self.parser.blocks.get(ALERT)?;
        if self.depth + 1 > MAX_NESTING_DEPTH {
            tracing::warn!(block_type = ALERT, depth = self.depth, "flattening block nested too deeply");
            return None;
        }
        let first = node.first_child()?;
        if !matches!(first.data.borrow().value, NodeValue::Paragraph) {
            return None;
        }

        let mut marker = String::new();
        let mut rest = Vec::new();
        for child in first.children() {
            if !rest.is_empty() {
                rest.push(child);
                continue;
            }
            match &child.data.borrow().value {
                NodeValue::Text(text) => marker.push_str(text),
                NodeValue::SoftBreak | NodeValue::LineBreak => rest.push(child),
                _ => return None,
            }
        }
        let alert_type = ALERT_MARKER
            .captures(marker.trim())
            .and_then(|caps| AlertType::parse(&caps[1]))?;

        let mut body = Builder::new(self.parser, self.source, self.depth + 1);
        if rest.len() > 1 {
            body.inlines(rest.into_iter().skip(1), &AttributeMap::new(), &AttributeMap::new());
            body.push_newline(&AttributeMap::new());
        }
        for child in node.children().skip(1) {
            body.block(child, &Scope::default());
        }
        let data = AlertData {
            alert_type,
            content: body.nested(),
        };
        Some(handler.normalize(data.to_value()))
    }

    fn table<'n>(&mut self, node: &'n AstNode<'n>, alignments: &[TableAlignment], scope: &Scope) {
        let mut rows: Vec<(bool, Vec<&'n AstNode<'n>>)> = node
            .children()
            .map(|row| {
                let header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
                (header, row.children().collect())
            })
            .collect();
        let empty_header = rows
            .first()
            .is_some_and(|(header, cells)| *header && cells.iter().all(|c| c.first_child().is_none()));
        if empty_header {
            rows.remove(0);
        }
        let header_rows = usize::from(rows.first().is_some_and(|(header, _)| *header));
        let aligns: Vec<Align> = alignments
            .iter()
            .map(|alignment| match alignment {
                TableAlignment::Center => Align::Center,
                TableAlignment::Right => Align::Right,
                _ => Align::Left,
            })
            .collect();

        if self.parser.blocks.has(TABLE) {
            if let Some(data) = self.table_block(&rows, header_rows, aligns.clone()) {
                self.push_embed(BLOCK_EMBED, data, AttributeMap::new());
                self.push_newline(&scope.block);
                return;
            }
        }
        tracing::debug!(depth = self.depth, "reading table as simple table lines");
        self.simple_table(&rows, &aligns);
    }

    fn table_block<'n>(
        &self,
        rows: &[(bool, Vec<&'n AstNode<'n>>)],
        header_rows: usize,
        aligns: Vec<Align>,
    ) -> Option<Value> {
        if self.depth + 1 > MAX_NESTING_DEPTH {
            tracing::warn!(block_type = TABLE, depth = self.depth, "flattening block nested too deeply");
            return None;
        }
        let cols = rows
            .iter()
            .map(|(_, cells)| cells.len())
            .max()
            .unwrap_or(0)
            .max(aligns.len());
        let mut cells = BTreeMap::new();
        for (row, (_, row_cells)) in rows.iter().enumerate() {
            for col in 0..cols {
                let content = match row_cells.get(col) {
                    Some(cell) => {
                        let mut body = Builder::new(self.parser, self.source, self.depth + 1);
                        body.inlines(cell.children(), &AttributeMap::new(), &AttributeMap::new());
                        if !body.delta.is_empty() {
                            body.push_newline(&AttributeMap::new());
                        }
                        body.nested()
                    }
                    None => Delta::empty_line(),
                };
                cells.insert(CellPos::new(row, col), Some(TableCell::new(content)));
            }
        }
        match TableData::from_cells(cells, header_rows, None, Some(aligns)) {
            Ok(table) => {
                let handler = self.parser.blocks.get(TABLE)?;
                Some(handler.normalize(table.to_value()))
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not build table grid");
                None
            }
        }
    }

    fn simple_table<'n>(&mut self, rows: &[(bool, Vec<&'n AstNode<'n>>)], aligns: &[Align]) {
        for (row, (header, cells)) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let mut block = AttributeMap::new();
                block.insert(TABLE_ROW.to_string(), Value::from(row));
                block.insert(TABLE_COL.to_string(), Value::from(col));
                if *header {
                    block.insert(TABLE_HEADER.to_string(), Value::Bool(true));
                }
                if let Some(align) = aligns.get(col).filter(|a| **a != Align::Left) {
                    block.insert(TABLE_COL_ALIGN.to_string(), Value::from(align.as_str()));
                }
                self.inlines(cell.children(), &AttributeMap::new(), &block);
                self.push_newline(&block);
            }
        }
    }

    /// Walk sibling inline nodes. Inline HTML tags among them open and close attribute
    /// scopes that span the siblings in between.
    fn inlines<'n>(
        &mut self,
        nodes: impl Iterator<Item = &'n AstNode<'n>>,
        inline: &AttributeMap,
        block: &AttributeMap,
    ) {
        let mut tags = TagStack::new(inline);
        for node in nodes {
            let data = node.data.borrow();
            if let NodeValue::HtmlInline(html) = &data.value {
                self.inline_html(html, &mut tags, block);
                continue;
            }
            if tags.suppressed() {
                continue;
            }
            self.inline(node, tags.current(), block);
        }
    }

    fn inline_html(&mut self, html: &str, tags: &mut TagStack, block: &AttributeMap) {
        let Some(tag) = classify(html) else {
            return;
        };
        match tag {
            InlineTag::Open { tag, attributes } => tags.open(tag, attributes),
            InlineTag::Close(tag) => tags.close(&tag),
            _ if tags.suppressed() => {}
            InlineTag::Break => self.push_newline(block),
            InlineTag::Image {
                src,
                mut attributes,
            } => {
                if let Some(link) = tags.current().get(LINK) {
                    attributes.insert(LINK.to_string(), link.clone());
                }
                self.push_embed(IMAGE, Value::from(src), attributes);
            }
            InlineTag::Formula(latex) => {
                self.push_embed(FORMULA, Value::from(latex), AttributeMap::new());
                tags.open_suppressed("span".to_string());
            }
        }
    }

    fn inline<'n>(&mut self, node: &'n AstNode<'n>, inline: &AttributeMap, block: &AttributeMap) {
        let with = |key: &str, value: Value| {
            let mut attrs = inline.clone();
            attrs.insert(key.to_string(), value);
            attrs
        };
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Text(text) => self.push_text(text, inline),
            NodeValue::SoftBreak => self.push_text(" ", inline),
            NodeValue::LineBreak => self.push_newline(block),
            NodeValue::Code(code) => self.push_text(&code.literal, &with(CODE, Value::Bool(true))),
            NodeValue::Emph => self.inlines(node.children(), &with(ITALIC, Value::Bool(true)), block),
            NodeValue::Strong => self.inlines(node.children(), &with(BOLD, Value::Bool(true)), block),
            NodeValue::Strikethrough => {
                self.inlines(node.children(), &with(STRIKE, Value::Bool(true)), block)
            }
            NodeValue::Link(link) => {
                self.inlines(node.children(), &with(LINK, Value::from(link.url.as_str())), block)
            }
            NodeValue::Image(link) => {
                let mut attributes = AttributeMap::new();
                let alt = plain_text(node);
                if !alt.is_empty() {
                    attributes.insert(ALT.to_string(), Value::from(alt));
                }
                if let Some(href) = inline.get(LINK) {
                    attributes.insert(LINK.to_string(), href.clone());
                }
                self.push_embed(IMAGE, Value::from(link.url.as_str()), attributes);
            }
            NodeValue::Math(math) => {
                self.push_embed(FORMULA, Value::from(math.literal.as_str()), AttributeMap::new())
            }
            NodeValue::FootnoteReference(reference) => {
                self.push_embed(FOOTNOTE_REF, Value::from(reference.name.as_str()), AttributeMap::new())
            }
            _ => self.inlines(node.children(), inline, block),
        }
    }

    /// Remove a trailing `{#id}` from the heading text just written.
    fn take_heading_id(&mut self) -> Option<String> {
        let last = self.delta.ops.last_mut()?;
        let Some(Insert::Text(text)) = last.insert.as_mut() else {
            return None;
        };
        let (start, id) = {
            let caps = HEADING_ID.captures(text)?;
            (caps.get(0)?.start(), caps[1].to_string())
        };
        text.truncate(start);
        if text.is_empty() {
            self.delta.ops.pop();
        }
        Some(id)
    }
}

/// One-based line of `source`.
fn source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.checked_sub(1)?)
}

/// Whether a heading line ends in an unescaped `{#id}`, before any closing `#` run.
fn has_trailing_id(line: &str) -> bool {
    let line = line.trim_end();
    let open = line.trim_end_matches('#');
    let line = if open.len() < line.len() && open.ends_with(|c| c == ' ' || c == '\t') {
        open
    } else {
        line
    };
    HEADING_ID
        .find(line)
        .and_then(|m| m.as_str().find('{').map(|offset| m.start() + offset))
        .is_some_and(|brace| {
            line[..brace].bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 0
        })
}

/// Text of an inline subtree, for image alt text.
fn plain_text<'n>(node: &'n AstNode<'n>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(t) => text.push_str(t),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&plain_text(child)),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use serde_json::json;

    fn parse(source: &str) -> Delta {
        parse_with(source, &BlockRegistry::with_defaults())
    }

    fn parse_with(source: &str, blocks: &BlockRegistry) -> Delta {
        let options = MarkdownParseOptions::default();
        let attributes = AttributeRegistry::with_defaults();
        MarkdownParser::new(&options, blocks, &attributes).parse(source)
    }

    #[test]
    fn test_paragraphs_and_soft_breaks() {
        assert_eq!(
            parse("one\ntwo\n\nthree\n"),
            Delta::new().insert("one two\nthree\n")
        );
    }

    #[test]
    fn test_inline_formats() {
        let delta = parse("**bold *both*** `code` ~~gone~~ [site](https://x.org)\n");
        let expected = Delta::new()
            .insert_with("bold ", attrs! { "bold" => true })
            .insert_with("both", attrs! { "bold" => true, "italic" => true })
            .insert(" ")
            .insert_with("code", attrs! { "code" => true })
            .insert(" ")
            .insert_with("gone", attrs! { "strike" => true })
            .insert(" ")
            .insert_with("site", attrs! { "link" => "https://x.org" })
            .insert("\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_hard_break_ends_the_line() {
        assert_eq!(parse("a  \nb\n"), Delta::new().insert("a\nb\n"));
        assert_eq!(parse("a<br>b\n"), Delta::new().insert("a\nb\n"));
    }

    #[test]
    fn test_heading_with_id() {
        let expected = Delta::new()
            .insert("Usage")
            .insert_with("\n", attrs! { "header" => 2, "header-id" => "use" })
            .insert("Plain")
            .insert_with("\n", attrs! { "header" => 1 });
        assert_eq!(parse("## Usage {#use}\n\n# Plain\n"), expected);
    }

    #[test]
    fn test_heading_id_must_be_unescaped_source() {
        assert_eq!(
            parse("## Title \\{#x}\n"),
            Delta::new()
                .insert("Title {#x}")
                .insert_with("\n", attrs! { "header" => 2 })
        );
        assert_eq!(
            parse("# **{#x}**\n"),
            Delta::new()
                .insert_with("{#x}", attrs! { "bold" => true })
                .insert_with("\n", attrs! { "header" => 1 })
        );
        assert_eq!(
            parse("## Usage {#use} ##\n"),
            Delta::new()
                .insert("Usage")
                .insert_with("\n", attrs! { "header" => 2, "header-id" => "use" })
        );
    }

    #[test]
    fn test_nested_and_task_lists() {
        let source = "1. one\n    - inner\n2. two\n\n- [ ] todo\n- [x] done\n";
        let expected = Delta::new()
            .insert("one")
            .insert_with("\n", attrs! { "list" => "ordered" })
            .insert("inner")
            .insert_with("\n", attrs! { "list" => "bullet", "indent" => 1 })
            .insert("two")
            .insert_with("\n", attrs! { "list" => "ordered" })
            .insert("todo")
            .insert_with("\n", attrs! { "list" => "unchecked" })
            .insert("done")
            .insert_with("\n", attrs! { "list" => "checked" });
        assert_eq!(parse(source), expected);
    }

    #[test]
    fn test_blockquote_lines() {
        let expected = Delta::new()
            .insert("one")
            .insert_with("\n", attrs! { "blockquote" => true })
            .insert("two")
            .insert_with("\n", attrs! { "blockquote" => true });
        assert_eq!(parse("> one\n>\n> two\n"), expected);
    }

    #[test]
    fn test_alert_becomes_block() {
        let delta = parse("> [!WARNING]\n> Mind the gap\n");
        let expected = Delta::new()
            .insert_embed(
                "block",
                json!({
                    "type": "alert",
                    "alertType": "warning",
                    "content": {"ops": [{"insert": "Mind the gap\n"}]}
                }),
            )
            .insert("\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_alert_without_handler_is_a_quote() {
        let delta = parse_with("> [!NOTE]\n> Hi\n", &BlockRegistry::new());
        assert_eq!(
            delta,
            Delta::new()
                .insert("[!NOTE] Hi")
                .insert_with("\n", attrs! { "blockquote" => true })
        );
    }

    #[test]
    fn test_code_blocks_and_diagrams() {
        let delta = parse("```rust\nfn main() {}\n\n```\n\n```mermaid\ngraph TD\n```\n");
        let expected = Delta::new()
            .insert("fn main() {}")
            .insert_with("\n", attrs! { "code-block" => "rust" })
            .insert_with("\n", attrs! { "code-block" => "rust" })
            .insert_embed("diagram", json!("graph TD"))
            .insert("\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_math_and_embeds() {
        let delta = parse("![A cat](cat.png) $x$[^1]\n\n$y$\n\n---\n\n[^1]: Note\n");
        let expected = Delta::new()
            .insert_embed_with("image", json!("cat.png"), attrs! { "alt" => "A cat" })
            .insert(" ")
            .insert_embed("formula", json!("x"))
            .insert_embed("footnote-ref", json!("1"))
            .insert("\n")
            .insert_embed("formula", json!("y"))
            .insert("\n")
            .insert_embed("divider", json!(true))
            .insert("\n")
            .insert_embed(
                "block",
                json!({
                    "type": "footnotes",
                    "items": [{"id": "1", "content": {"ops": [{"insert": "Note\n"}]}}]
                }),
            )
            .insert("\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_inline_html_spans() {
        let delta = parse("<u>under</u> <span style=\"color: red\">red <sup>2</sup></span>\n");
        let expected = Delta::new()
            .insert_with("under", attrs! { "underline" => true })
            .insert(" ")
            .insert_with("red ", attrs! { "color" => "red" })
            .insert_with("2", attrs! { "color" => "red", "script" => "super" })
            .insert("\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_simple_table_without_handler() {
        let delta = parse_with("| A | B |\n| --- | :---: |\n| 1 | 2 |\n", &BlockRegistry::new());
        let cell = |row: usize, col: usize, header: bool| {
            let mut attrs = attrs! { "table-row" => row, "table-col" => col };
            if header {
                attrs.insert("table-header".to_string(), json!(true));
            }
            if col == 1 {
                attrs.insert("table-col-align".to_string(), json!("center"));
            }
            attrs
        };
        let expected = Delta::new()
            .insert("A")
            .insert_with("\n", cell(0, 0, true))
            .insert("B")
            .insert_with("\n", cell(0, 1, true))
            .insert("1")
            .insert_with("\n", cell(1, 0, false))
            .insert("2")
            .insert_with("\n", cell(1, 1, false));
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_table_block_with_empty_header() {
        let delta = parse("|  |  |\n| --- | --- |\n| a | b |\n");
        let data = delta.ops[0].as_block().cloned().unwrap();
        let table = TableData::from_value(&data).unwrap();
        assert_eq!(table.header_rows, 0);
        assert_eq!((table.rows, table.cols), (1, 2));
        assert_eq!(table.col_aligns, None);
    }

    #[test]
    fn test_html_block_is_delegated() {
        let delta = parse("<p style=\"text-align: center\">mid</p>\n\nafter\n");
        let expected = Delta::new()
            .insert("mid")
            .insert_with("\n", attrs! { "align" => "center" })
            .insert("after\n");
        assert_eq!(delta, expected);
    }

    #[test]
    fn test_standalone_break_is_an_empty_line() {
        assert_eq!(parse("a\n\n<br>\n\nb\n"), Delta::new().insert("a\n\nb\n"));
    }
}
