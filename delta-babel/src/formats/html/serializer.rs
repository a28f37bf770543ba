//! HTML serialization (document → HTML)
//!
//! Pipeline: Delta → lines → look-ahead runs (tables, code blocks, lists) → HTML string.
//! Block embeds are rendered by their registered handler through a context whose
//! callback re-enters [`HtmlSerializer::render_document`] one level deeper.

use crate::attributes::AttributeRegistry;
use crate::blocks::{BlockRegistry, HtmlRenderContext};
use crate::common::inline::{color_style, InlineFormat, DECLARED_ORDER};
use crate::common::runs::{block_level_embed, code_block_run, group_rows, table_run, TableRowGroup};
use crate::common::slug::SlugTable;
use crate::delta::attrs::{
    ALT, BLOCKQUOTE, DIAGRAM, DIVIDER, DRAWIO, FLOAT, FOOTNOTE_REF, FORMULA, HEADER_ID, HEIGHT,
    IMAGE, LINK, VIDEO, WIDTH,
};
use crate::delta::{
    split, Align, AttributeMap, AttributesExt, Delta, Line, ListType, Op, BLOCK_EMBED,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::Value;
use std::borrow::Cow;

/// Unit of the column widths written by the table handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthUnit {
    #[default]
    Percent,
    Pixel,
}

impl WidthUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "percent" | "%" => Some(WidthUnit::Percent),
            "pixel" | "px" => Some(WidthUnit::Pixel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WidthUnit::Percent => "percent",
            WidthUnit::Pixel => "pixel",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            WidthUnit::Percent => "%",
            WidthUnit::Pixel => "px",
        }
    }
}

/// Options for HTML serialization
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlOptions {
    /// Put a newline between top-level blocks.
    pub pretty: bool,
    /// Tag of an element wrapped around the whole output, e.g. `article`.
    pub wrapper: Option<String>,
    /// Give every heading an `id` derived from its text.
    pub anchor_links: bool,
    /// Write `data-number="2.1"` style numbers on ordered list items.
    pub hierarchical_numbering: bool,
    pub table_width: WidthUnit,
    /// Drop attributes the attribute registry rejects before rendering.
    pub sanitize: bool,
}

impl HtmlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_wrapper(mut self, tag: impl Into<String>) -> Self {
        self.wrapper = Some(tag.into());
        self
    }

    pub fn with_anchor_links(mut self, anchor_links: bool) -> Self {
        self.anchor_links = anchor_links;
        self
    }

    pub fn with_hierarchical_numbering(mut self, numbering: bool) -> Self {
        self.hierarchical_numbering = numbering;
        self
    }

    pub fn with_table_width(mut self, unit: WidthUnit) -> Self {
        self.table_width = unit;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }
}

/// Serialize a document to HTML with the standard block handlers and attribute formats
pub fn serialize_to_html(delta: &Delta, options: &HtmlOptions) -> String {
    let blocks = BlockRegistry::with_defaults();
    let attributes = AttributeRegistry::with_defaults();
    HtmlSerializer::new(options, &blocks, &attributes).serialize(delta)
}

pub struct HtmlSerializer<'a> {
    options: &'a HtmlOptions,
    blocks: &'a BlockRegistry,
    attributes: &'a AttributeRegistry,
}

impl<'a> HtmlSerializer<'a> {
    pub fn new(
        options: &'a HtmlOptions,
        blocks: &'a BlockRegistry,
        attributes: &'a AttributeRegistry,
    ) -> Self {
        HtmlSerializer {
            options,
            blocks,
            attributes,
        }
    }

    /// Serialize a top-level document, applying the configured wrapper.
    pub fn serialize(&self, delta: &Delta) -> String {
        let body = self.render_document(delta, 0);
        match &self.options.wrapper {
            Some(tag) if self.options.pretty => format!("<{tag}>\n{body}\n</{tag}>"),
            Some(tag) => format!("<{tag}>{body}</{tag}>"),
            None => body,
        }
    }

    /// Render one document. `depth` is 0 for the top-level document and grows by one
    /// for every block embed the document is nested in.
    pub fn render_document(&self, delta: &Delta, depth: usize) -> String {
        let lines = split(delta);
        let mut blocks: Vec<String> = Vec::new();
        let mut lists = ListWriter::default();
        let mut slugs = SlugTable::new();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            let attrs = self.clean(line.attributes.as_ref());

            if attrs.list().is_none() {
                if let Some(html) = lists.close_all() {
                    blocks.push(html);
                }
            }

            if let Some(end) = table_run(&lines, i) {
                blocks.push(self.simple_table(&lines[i..end], depth));
                i = end;
                continue;
            }
            if let Some(end) = code_block_run(&lines, i) {
                blocks.push(self.code_block(&lines[i..end]));
                i = end;
                continue;
            }
            if let Some(op) = block_level_embed(line) {
                if let Some(list) = lists.close_all() {
                    blocks.push(list);
                }
                blocks.push(self.render_op(op, depth));
                i += 1;
                continue;
            }

            if let Some(kind) = attrs.list() {
                lists.item(
                    kind,
                    attrs.indent(),
                    self.options.hierarchical_numbering,
                    &block_style(&attrs, false),
                    &self.line_content(line, depth),
                );
            } else {
                blocks.push(self.block(line, &attrs, &mut slugs, depth));
            }
            i += 1;
        }

        if let Some(html) = lists.close_all() {
            blocks.push(html);
        }

        let separator = if self.options.pretty && depth == 0 { "\n" } else { "" };
        blocks.join(separator)
    }

    fn clean<'m>(&self, attrs: Option<&'m AttributeMap>) -> Cow<'m, AttributeMap> {
        match attrs {
            Some(attrs) if self.options.sanitize => Cow::Owned(self.attributes.sanitize(attrs)),
            Some(attrs) => Cow::Borrowed(attrs),
            None => Cow::Owned(AttributeMap::new()),
        }
    }

    /// Paragraph, heading or blockquote line.
    fn block(
        &self,
        line: &Line,
        attrs: &AttributeMap,
        slugs: &mut SlugTable,
        depth: usize,
    ) -> String {
        let content = self.line_content(line, depth);
        let style = block_style(attrs, true);

        if let Some(level) = attrs.header() {
            let auto = slugs.unique(&line.plain_text());
            let id = match attrs.str_value(HEADER_ID) {
                Some(explicit) => Some(explicit.to_string()),
                None => self.options.anchor_links.then_some(auto),
            };
            let id = id
                .map(|id| format!(" id=\"{}\"", encode_double_quoted_attribute(&id)))
                .unwrap_or_default();
            let heading = format!("<h{level}{id}{style}>{content}</h{level}>");
            if attrs.flag(BLOCKQUOTE) {
                return format!("<blockquote>{heading}</blockquote>");
            }
            return heading;
        }

        if attrs.flag(BLOCKQUOTE) {
            format!("<blockquote{style}>{content}</blockquote>")
        } else {
            format!("<p{style}>{content}</p>")
        }
    }

    fn line_content(&self, line: &Line, depth: usize) -> String {
        if line.is_empty() {
            return "<br>".to_string();
        }
        self.render_inline(&line.ops, depth)
    }

    /// Inline markup of a run of ops.
    pub(crate) fn render_inline(&self, ops: &[Op], depth: usize) -> String {
        ops.iter().map(|op| self.render_op(op, depth)).collect()
    }

    fn render_op(&self, op: &Op, depth: usize) -> String {
        let attrs = self.clean(op.attributes.as_ref());
        if let Some(text) = op.as_text() {
            return self.wrap_text(encode_text(text).into_owned(), &attrs);
        }
        let Some((kind, value)) = op.as_embed() else {
            return String::new();
        };
        let html = self.render_embed(kind, value, &attrs, depth);
        match attrs.str_value(LINK) {
            Some(href) if kind != BLOCK_EMBED => link(&html, href),
            _ => html,
        }
    }

    /// Inline wrappers from the inside out: color span, tag formats in reverse declared
    /// order, registered custom formats, then the link.
    fn wrap_text(&self, mut html: String, attrs: &AttributeMap) -> String {
        if let Some(style) = color_style(attrs) {
            html = format!(
                "<span style=\"{}\">{html}</span>",
                encode_double_quoted_attribute(&style)
            );
        }
        for format in DECLARED_ORDER.iter().rev() {
            if let Some(tag) = format.html_tag(attrs) {
                html = format!("<{tag}>{html}</{tag}>");
            }
        }
        for (key, value) in attrs {
            if InlineFormat::is_builtin_key(key) {
                continue;
            }
            if let Some(wrapped) = self
                .attributes
                .get(key)
                .and_then(|format| format.render_html(value, &html))
            {
                html = wrapped;
            }
        }
        match attrs.str_value(LINK) {
            Some(href) => link(&html, href),
            None => html,
        }
    }

    fn render_embed(&self, kind: &str, value: &Value, attrs: &AttributeMap, depth: usize) -> String {
        match kind {
            IMAGE => match value.as_str() {
                Some(src) => image(src, attrs),
                None => placeholder(kind, value),
            },
            VIDEO => format!(
                "<video src=\"{}\" controls></video>",
                attribute(&value_text(value))
            ),
            FORMULA => {
                let latex = value_text(value);
                format!(
                    "<span class=\"formula\" data-formula=\"{}\">{}</span>",
                    attribute(&latex),
                    encode_text(&latex)
                )
            }
            DIVIDER => "<hr>".to_string(),
            FOOTNOTE_REF => {
                let id = value_text(value);
                let attr_id = attribute(&id);
                format!(
                    "<sup class=\"footnote-ref\"><a href=\"#fn-{attr_id}\" id=\"fnref-{attr_id}\">{}</a></sup>",
                    encode_text(&id)
                )
            }
            DIAGRAM => format!(
                "<pre class=\"mermaid\">{}</pre>",
                encode_text(&value_text(value))
            ),
            DRAWIO => format!(
                "<div class=\"drawio\" data-src=\"{}\"></div>",
                attribute(&value_text(value))
            ),
            BLOCK_EMBED => self.render_block(value, depth).unwrap_or_default(),
            _ => placeholder(kind, value),
        }
    }

    fn render_block(&self, data: &Value, depth: usize) -> Option<String> {
        let render = |delta: &Delta| self.render_document(delta, depth + 1);
        let ctx = HtmlRenderContext::new(self.options, depth + 1, &render);
        self.blocks.render_html(data, &ctx)
    }

    /// Table run of the line model: one line per cell, inline content only.
    fn simple_table(&self, run: &[Line], depth: usize) -> String {
        let rows = group_rows(run);
        let header_count = rows.iter().take_while(|row| row.is_header()).count();
        let mut html = String::from("<table>");

        if header_count > 0 {
            html.push_str("<thead>");
            self.table_rows(&mut html, &rows[..header_count], depth);
            html.push_str("</thead>");
        }
        if rows.len() > header_count {
            html.push_str("<tbody>");
            self.table_rows(&mut html, &rows[header_count..], depth);
            html.push_str("</tbody>");
        }
        html.push_str("</table>");
        html
    }

    fn table_rows(&self, html: &mut String, rows: &[TableRowGroup<'_>], depth: usize) {
        for row in rows {
            html.push_str("<tr>");
            for cell in &row.cells {
                let tag = if cell.header { "th" } else { "td" };
                html.push_str(&format!(
                    "<{tag}{}>{}</{tag}>",
                    align_style(cell.align),
                    self.render_inline(&cell.line.ops, depth)
                ));
            }
            html.push_str("</tr>");
        }
    }

    fn code_block(&self, run: &[Line]) -> String {
        let language = run
            .first()
            .and_then(|line| line.attributes.as_ref())
            .and_then(|attrs| attrs.code_block())
            .flatten()
            .map(attribute);
        let text: Vec<String> = run
            .iter()
            .map(|line| encode_text(&line.plain_text()).into_owned())
            .collect();
        let text = text.join("\n");
        match language {
            Some(lang) => format!(
                "<pre data-language=\"{lang}\"><code class=\"language-{lang}\">{text}</code></pre>"
            ),
            None => format!("<pre><code>{text}</code></pre>"),
        }
    }
}

struct OpenList {
    kind: ListType,
    indent: usize,
    item_open: bool,
}

/// Nests flat list lines into `<ul>`/`<ol>` trees and keeps the hierarchical counters.
#[derive(Default)]
struct ListWriter {
    html: String,
    stack: Vec<OpenList>,
    /// Ordinal of the current ordered item at each indent level.
    counters: Vec<usize>,
}

impl ListWriter {
    fn item(&mut self, kind: ListType, indent: usize, numbering: bool, style: &str, content: &str) {
        while self.stack.last().is_some_and(|top| top.indent > indent) {
            self.close_top();
        }
        if let Some(top) = self.stack.last_mut() {
            if top.indent == indent {
                if top.kind == kind {
                    if top.item_open {
                        self.html.push_str("</li>");
                        top.item_open = false;
                    }
                } else {
                    self.close_top();
                }
            }
        }

        let first_level = self.stack.last().map_or(0, |top| top.indent + 1);
        for level in first_level..=indent {
            self.html.push_str(open_tag(kind));
            self.stack.push(OpenList {
                kind,
                indent: level,
                item_open: false,
            });
        }

        self.html.push_str("<li");
        if kind.is_ordered() {
            let number = self.next_number(indent);
            if numbering {
                self.html.push_str(&format!(" data-number=\"{number}\""));
            }
        }
        self.html.push_str(style);
        self.html.push('>');
        self.html.push_str(content);
        if let Some(top) = self.stack.last_mut() {
            top.item_open = true;
        }
    }

    fn next_number(&mut self, indent: usize) -> String {
        self.counters.resize(indent + 1, 0);
        self.counters[indent] += 1;
        let parts: Vec<String> = self.counters.iter().map(usize::to_string).collect();
        parts.join(".")
    }

    fn close_top(&mut self) {
        let Some(list) = self.stack.pop() else {
            return;
        };
        if list.item_open {
            self.html.push_str("</li>");
        }
        self.html.push_str(close_tag(list.kind));
        self.counters.truncate(list.indent);
    }

    /// Close every open list and hand back the finished markup.
    fn close_all(&mut self) -> Option<String> {
        if self.stack.is_empty() {
            return None;
        }
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.counters.clear();
        Some(std::mem::take(&mut self.html))
    }
}

fn open_tag(kind: ListType) -> &'static str {
    match kind {
        ListType::Ordered => "<ol>",
        ListType::Bullet => "<ul>",
        ListType::Checked => "<ul data-checked=\"true\">",
        ListType::Unchecked => "<ul data-checked=\"false\">",
    }
}

fn close_tag(kind: ListType) -> &'static str {
    match kind {
        ListType::Ordered => "</ol>",
        _ => "</ul>",
    }
}

/// ` style="..."` for alignment and (optionally) indentation, or nothing.
fn block_style(attrs: &AttributeMap, with_indent: bool) -> String {
    let mut parts = Vec::new();
    if let Some(align) = attrs.align() {
        parts.push(format!("text-align: {}", align.as_str()));
    }
    let indent = attrs.indent();
    if with_indent && indent > 0 {
        parts.push(format!("margin-left: {}em", indent * 2));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" style=\"{}\"", parts.join("; "))
    }
}

fn image(src: &str, attrs: &AttributeMap) -> String {
    let mut html = format!("<img src=\"{}\"", attribute(src));
    if let Some(alt) = attrs.str_value(ALT) {
        html.push_str(&format!(" alt=\"{}\"", attribute(alt)));
    }
    for key in [WIDTH, HEIGHT] {
        if let Some(value) = attrs.get(key).filter(|v| !v.is_null()) {
            html.push_str(&format!(" {key}=\"{}\"", attribute(&value_text(value))));
        }
    }
    if let Some(float) = attrs.str_value(FLOAT).filter(|f| *f != "none") {
        html.push_str(&format!(" style=\"float: {}\"", attribute(float)));
    }
    html.push('>');
    html
}

fn placeholder(kind: &str, value: &Value) -> String {
    format!(
        "<span data-embed=\"{}\" data-value=\"{}\"></span>",
        attribute(kind),
        attribute(&value.to_string())
    )
}

fn link(inner: &str, href: &str) -> String {
    format!("<a href=\"{}\">{inner}</a>", attribute(href))
}

fn attribute(value: &str) -> String {
    encode_double_quoted_attribute(value).into_owned()
}

/// String form of a scalar embed value.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// ` style="text-align: ..."` for a non-default cell alignment.
fn align_style(align: Option<Align>) -> String {
    match align {
        Some(align) if align != Align::Left => {
            format!(" style=\"text-align: {}\"", align.as_str())
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use serde_json::json;

    fn render(delta: &Delta, options: &HtmlOptions) -> String {
        serialize_to_html(delta, options)
    }

    fn html(delta: &Delta) -> String {
        render(delta, &HtmlOptions::default())
    }

    #[test]
    fn test_paragraphs_and_escaping() {
        let delta = Delta::new().insert("a < b & c\n\nafter\n");
        insta::assert_snapshot!(html(&delta), @"<p>a &lt; b &amp; c</p><p><br></p><p>after</p>");
    }

    #[test]
    fn test_inline_nesting_order() {
        let delta = Delta::new()
            .insert_with(
                "x",
                attrs! { "italic" => true, "bold" => true, "color" => "red", "link" => "https://a.b" },
            )
            .insert("\n");
        insta::assert_snapshot!(
            html(&delta),
            @r#"<p><a href="https://a.b"><strong><em><span style="color: red">x</span></em></strong></a></p>"#
        );
    }

    #[test]
    fn test_headings_with_anchor_links() {
        let delta = Delta::new()
            .insert("FAQ")
            .insert_with("\n", attrs! { "header" => 2 })
            .insert("FAQ")
            .insert_with("\n", attrs! { "header" => 2 })
            .insert("Custom")
            .insert_with("\n", attrs! { "header" => 3, "header-id" => "mine" });
        let options = HtmlOptions::default().with_anchor_links(true);
        insta::assert_snapshot!(
            render(&delta, &options),
            @r#"<h2 id="faq">FAQ</h2><h2 id="faq-1">FAQ</h2><h3 id="mine">Custom</h3>"#
        );

        let plain = Delta::new().insert("FAQ").insert_with("\n", attrs! { "header" => 2 });
        assert_eq!(html(&plain), "<h2>FAQ</h2>");
    }

    #[test]
    fn test_nested_lists_and_hierarchical_numbers() {
        let mut delta = Delta::new();
        for (text, indent) in [("a", 0), ("b", 0), ("b1", 1), ("b1a", 2), ("b2", 1), ("c", 0)] {
            delta = delta
                .insert(text)
                .insert_with("\n", attrs! { "list" => "ordered", "indent" => indent });
        }
        let options = HtmlOptions::default().with_hierarchical_numbering(true);
        let html = render(&delta, &options);
        let numbers: Vec<&str> = html
            .split("data-number=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect();
        assert_eq!(numbers, vec!["1", "2", "2.1", "2.1.1", "2.2", "3"]);
        assert!(html.starts_with("<ol><li data-number=\"1\">a</li><li data-number=\"2\">b<ol>"));
        assert!(html.ends_with("</ol></li><li data-number=\"3\">c</li></ol>"));
    }

    #[test]
    fn test_list_kind_change_starts_a_new_list() {
        let delta = Delta::new()
            .insert("one")
            .insert_with("\n", attrs! { "list" => "bullet" })
            .insert("done")
            .insert_with("\n", attrs! { "list" => "checked" })
            .insert("todo")
            .insert_with("\n", attrs! { "list" => "unchecked" });
        insta::assert_snapshot!(
            html(&delta),
            @r#"<ul><li>one</li></ul><ul data-checked="true"><li>done</li></ul><ul data-checked="false"><li>todo</li></ul>"#
        );
    }

    #[test]
    fn test_code_block_run() {
        let delta = Delta::new()
            .insert("fn main() {")
            .insert_with("\n", attrs! { "code-block" => "rust" })
            .insert("    1 < 2")
            .insert_with("\n", attrs! { "code-block" => "rust" })
            .insert("}")
            .insert_with("\n", attrs! { "code-block" => "rust" });
        insta::assert_snapshot!(html(&delta), @r#"
        <pre data-language="rust"><code class="language-rust">fn main() {
            1 &lt; 2
        }</code></pre>
        "#);
    }

    #[test]
    fn test_block_style_alignment_and_indent() {
        let delta = Delta::new()
            .insert("centered")
            .insert_with("\n", attrs! { "align" => "center", "indent" => 1 });
        insta::assert_snapshot!(
            html(&delta),
            @r#"<p style="text-align: center; margin-left: 2em">centered</p>"#
        );
    }

    #[test]
    fn test_embeds() {
        let delta = Delta::new()
            .insert_embed_with("image", json!("a.png"), attrs! { "alt" => "A", "width" => 120 })
            .insert_embed("formula", json!("x^2"))
            .insert_embed("footnote-ref", json!("1"))
            .insert_embed("mystery", json!({"k": 1}))
            .insert("\n")
            .insert_embed("divider", json!(true))
            .insert("\n");
        insta::assert_snapshot!(
            html(&delta),
            @r##"<p><img src="a.png" alt="A" width="120"><span class="formula" data-formula="x^2">x^2</span><sup class="footnote-ref"><a href="#fn-1" id="fnref-1">1</a></sup><span data-embed="mystery" data-value="{&quot;k&quot;:1}"></span></p><hr>"##
        );
    }

    #[test]
    fn test_simple_table() {
        let delta = Delta::new()
            .insert("H")
            .insert_with("\n", attrs! { "table-row" => 0, "table-col" => 0, "table-header" => true })
            .insert("v")
            .insert_with("\n", attrs! { "table-row" => 1, "table-col" => 0, "table-col-align" => "right" });
        insta::assert_snapshot!(
            html(&delta),
            @r#"<table><thead><tr><th>H</th></tr></thead><tbody><tr><td style="text-align: right">v</td></tr></tbody></table>"#
        );
    }

    #[test]
    fn test_block_embed_and_skipped_block() {
        let alert = json!({"type": "alert", "alertType": "tip",
            "content": {"ops": [{"insert": "Inner\n"}]}});
        let delta = Delta::new()
            .insert_embed("block", alert)
            .insert("\n")
            .insert_embed("block", json!({"type": "unknown"}))
            .insert("\n")
            .insert("after\n");
        insta::assert_snapshot!(
            html(&delta),
            @r#"<div class="markdown-alert markdown-alert-tip"><p class="markdown-alert-title">Tip</p><p>Inner</p></div><p>after</p>"#
        );
    }

    #[test]
    fn test_wrapper_and_pretty() {
        let delta = Delta::new().insert("a\nb\n");
        let options = HtmlOptions::default().with_pretty(true).with_wrapper("article");
        assert_eq!(render(&delta, &options), "<article>\n<p>a</p>\n<p>b</p>\n</article>");
    }

    #[test]
    fn test_sanitize_drops_rejected_attributes() {
        let delta = Delta::new()
            .insert_with("x", attrs! { "link" => "javascript:alert(1)", "color" => "red" })
            .insert("\n");
        let options = HtmlOptions::default().with_sanitize(true);
        assert_eq!(
            render(&delta, &options),
            "<p><span style=\"color: red\">x</span></p>"
        );
    }
}
