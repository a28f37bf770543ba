//! Markdown serialization (document → Markdown)
//!
//! Lines are grouped into runs the same way the HTML serializer groups them. Anything
//! Markdown has no syntax for (alignment, block indentation, sized images, merged table
//! cells, blocks without a Markdown form) is written as a one-line HTML block produced
//! by [`HtmlSerializer`], which CommonMark passes through untouched.

use crate::attributes::AttributeRegistry;
use crate::blocks::footnotes::is_footnote_id;
use crate::blocks::{block_type_of, BlockRegistry, MarkdownRenderContext};
use crate::common::inline::{color_style, InlineFormat, DECLARED_ORDER};
use crate::common::runs::{
    block_level_embed, code_block_run, column_index, group_rows, table_run, TableRowGroup,
};
use crate::delta::attrs::{
    ALT, BLOCKQUOTE, BOLD, CODE, DIAGRAM, DIVIDER, FLOAT, FOOTNOTE_REF, FORMULA, HEADER_ID,
    HEIGHT, IMAGE, ITALIC, LINK, STRIKE, WIDTH,
};
use crate::delta::{
    split, Align, AttributeMap, AttributesExt, Delta, Line, ListType, Op, BLOCK_EMBED,
};
use super::parser::HEADING_ID;
use crate::formats::html::{HtmlOptions, HtmlSerializer};
use html_escape::encode_double_quoted_attribute;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

/// How formula embeds are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathMode {
    /// `$x$` inline, `$$x$$` for a formula on a line of its own.
    #[default]
    Dollar,
    /// `<span class="formula" data-formula="x">`.
    Html,
}

impl MathMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dollar" | "dollars" => Some(MathMode::Dollar),
            "html" => Some(MathMode::Html),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MathMode::Dollar => "dollar",
            MathMode::Html => "html",
        }
    }
}

/// How Mermaid diagrams live in Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramMode {
    /// A fenced `mermaid` code block.
    #[default]
    Fenced,
    /// A `diagram` embed (`<pre class="mermaid">` when written).
    Embed,
}

impl DiagramMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fenced" | "code" => Some(DiagramMode::Fenced),
            "embed" | "html" => Some(DiagramMode::Embed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramMode::Fenced => "fenced",
            DiagramMode::Embed => "embed",
        }
    }
}

/// Options for Markdown serialization
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkdownOptions {
    /// Write empty lines as standalone `<br>` instead of dropping them.
    pub preserve_empty_lines: bool,
    pub math: MathMode,
    pub diagram: DiagramMode,
    /// Options of the HTML written for constructs without Markdown syntax.
    pub html: HtmlOptions,
}

impl MarkdownOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preserve_empty_lines(mut self, preserve: bool) -> Self {
        self.preserve_empty_lines = preserve;
        self
    }

    pub fn with_math(mut self, math: MathMode) -> Self {
        self.math = math;
        self
    }

    pub fn with_diagram(mut self, diagram: DiagramMode) -> Self {
        self.diagram = diagram;
        self
    }

    pub fn with_html(mut self, html: HtmlOptions) -> Self {
        self.html = html;
        self
    }
}

/// Serialize a document to Markdown with the standard block handlers and attribute
/// formats
pub fn serialize_to_markdown(delta: &Delta, options: &MarkdownOptions) -> String {
    let blocks = BlockRegistry::with_defaults();
    let attributes = AttributeRegistry::with_defaults();
    MarkdownSerializer::new(options, &blocks, &attributes).serialize(delta)
}

/// Tags that open a CommonMark HTML block which may start anywhere (start
/// condition 6), plus `pre` (condition 1).
const HTML_BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "col",
    "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "html",
    "legend", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

static ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,9})([.)])").expect("valid ordered marker regex"));

pub struct MarkdownSerializer<'a> {
    options: &'a MarkdownOptions,
    blocks: &'a BlockRegistry,
    attributes: &'a AttributeRegistry,
}

impl<'a> MarkdownSerializer<'a> {
    pub fn new(
        options: &'a MarkdownOptions,
        blocks: &'a BlockRegistry,
        attributes: &'a AttributeRegistry,
    ) -> Self {
        MarkdownSerializer {
            options,
            blocks,
            attributes,
        }
    }

    /// Serialize a top-level document. Non-empty output ends with a newline.
    pub fn serialize(&self, delta: &Delta) -> String {
        let mut markdown = self.render_document(delta, 0);
        if !markdown.is_empty() {
            markdown.push('\n');
        }
        markdown
    }

    /// Render one document. `depth` is 0 for the top-level document and grows by one
    /// for every block embed the document is nested in.
    pub fn render_document(&self, delta: &Delta, depth: usize) -> String {
        let lines = split(delta);
        let mut out = BlockWriter::default();
        let mut ordinals = Ordinals::default();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            let attrs = self.clean(line.attributes.as_ref());

            if attrs.list().is_none() {
                ordinals.reset();
            }

            if let Some(end) = table_run(&lines, i) {
                out.block(self.simple_table(&lines[i..end], depth));
                i = end;
                continue;
            }
            if let Some(end) = code_block_run(&lines, i) {
                out.block(self.code_block(&lines[i..end]));
                i = end;
                continue;
            }
            if let Some(op) = block_level_embed(line) {
                out.block(self.block_embed(op, depth));
                i += 1;
                continue;
            }

            if let Some(kind) = attrs.list() {
                let indent = attrs.indent();
                let marker = ordinals.marker(kind, indent);
                out.item(format!(
                    "{}{marker}{}",
                    "    ".repeat(indent),
                    self.render_inline(&line.ops, depth)
                ));
                i += 1;
                continue;
            }

            if attrs.flag(BLOCKQUOTE) && !needs_html(&attrs) {
                let end = self.quote_run(&lines, i);
                out.block(self.quote(&lines[i..end], depth));
                i = end;
                continue;
            }

            let block = if needs_html(&attrs) {
                self.html_lines(std::slice::from_ref(line), depth)
            } else if let Some(level) = attrs.header() {
                self.heading(level, &attrs, line, depth)
            } else {
                self.paragraph(line, depth)
            };
            out.block(block);
            i += 1;
        }

        out.finish()
    }

    fn clean<'m>(&self, attrs: Option<&'m AttributeMap>) -> Cow<'m, AttributeMap> {
        match attrs {
            Some(attrs) if self.options.html.sanitize => {
                Cow::Owned(self.attributes.sanitize(attrs))
            }
            Some(attrs) => Cow::Borrowed(attrs),
            None => Cow::Owned(AttributeMap::new()),
        }
    }

    fn html(&self) -> HtmlSerializer<'_> {
        HtmlSerializer::new(&self.options.html, self.blocks, self.attributes)
    }

    fn paragraph(&self, line: &Line, depth: usize) -> String {
        if line.is_empty() {
            return if self.options.preserve_empty_lines {
                "<br>".to_string()
            } else {
                String::new()
            };
        }
        if self.options.math == MathMode::Dollar {
            if let Some((FORMULA, value)) = line.single_embed().and_then(Op::as_embed) {
                return format!("$${}$$", value_text(value));
            }
        }
        self.render_inline(&line.ops, depth)
    }

    fn heading(&self, level: u8, attrs: &AttributeMap, line: &Line, depth: usize) -> String {
        let mut heading = format!(
            "{} {}",
            "#".repeat(level as usize),
            self.render_inline(&line.ops, depth)
        );
        match attrs.str_value(HEADER_ID) {
            Some(id) => heading.push_str(&format!(" {{#{id}}}")),
            // Trailing `{#...}` text would read back as an id.
            None => {
                let brace = HEADING_ID
                    .find(&heading)
                    .and_then(|m| m.as_str().find('{').map(|offset| m.start() + offset));
                if let Some(brace) = brace {
                    heading.insert(brace, '\\');
                }
            }
        }
        heading.trim_end().to_string()
    }

    /// End (exclusive) of the run of plain quoted lines starting at `start`.
    fn quote_run(&self, lines: &[Line], start: usize) -> usize {
        let quoted = |line: &Line| {
            let attrs = self.clean(line.attributes.as_ref());
            attrs.flag(BLOCKQUOTE)
                && attrs.list().is_none()
                && attrs.code_block().is_none()
                && !attrs.is_table_cell()
                && !needs_html(&attrs)
                && block_level_embed(line).is_none()
        };
        start + lines[start..].iter().take_while(|l| quoted(l)).count()
    }

    /// Consecutive quoted lines as one blockquote, one paragraph per line.
    fn quote(&self, run: &[Line], depth: usize) -> String {
        let lines: Vec<String> = run
            .iter()
            .map(|line| {
                let attrs = self.clean(line.attributes.as_ref());
                let content = match attrs.header() {
                    Some(level) => self.heading(level, &attrs, line, depth),
                    None => self.render_inline(&line.ops, depth),
                };
                if content.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {content}")
                }
            })
            .collect();
        lines.join("\n>\n")
    }

    fn code_block(&self, run: &[Line]) -> String {
        let language = run
            .first()
            .and_then(|line| line.attributes.as_ref())
            .and_then(|attrs| attrs.code_block())
            .flatten()
            .unwrap_or_default();
        let text: Vec<String> = run.iter().map(Line::plain_text).collect();
        fenced(language, &text.join("\n"))
    }

    fn block_embed(&self, op: &Op, depth: usize) -> String {
        let Some((kind, value)) = op.as_embed() else {
            return String::new();
        };
        match kind {
            DIVIDER => "---".to_string(),
            DIAGRAM if self.options.diagram == DiagramMode::Fenced => {
                fenced("mermaid", &value_text(value))
            }
            BLOCK_EMBED => {
                let Some(handler) = self.blocks.resolve(value, depth + 1) else {
                    return String::new();
                };
                let render = |delta: &Delta| self.render_document(delta, depth + 1);
                let ctx = MarkdownRenderContext::new(self.options, depth + 1, &render);
                match handler.to_markdown(value, &ctx) {
                    Some(markdown) => markdown,
                    None => {
                        tracing::debug!(
                            block_type = block_type_of(value),
                            depth,
                            "writing block as HTML"
                        );
                        html_block(&self.html().render_inline(std::slice::from_ref(op), depth))
                    }
                }
            }
            _ => html_block(&self.html().render_inline(std::slice::from_ref(op), depth)),
        }
    }

    fn simple_table(&self, run: &[Line], depth: usize) -> String {
        match self.gfm_table(&group_rows(run), depth) {
            Some(markdown) => markdown,
            None => {
                tracing::debug!(depth, "writing table as HTML");
                self.html_lines(run, depth)
            }
        }
    }

    /// GFM form of a simple table: a dense grid, at most one header row (at the top),
    /// one alignment per column.
    fn gfm_table(&self, rows: &[TableRowGroup<'_>], depth: usize) -> Option<String> {
        let header_count = rows.iter().take_while(|row| row.is_header()).count();
        if header_count > 1 || rows[header_count..].iter().any(|row| row.is_header()) {
            return None;
        }
        let cols = rows.first()?.cells.len();
        let dense = rows.iter().all(|row| {
            row.cells.len() == cols
                && row
                    .cells
                    .iter()
                    .enumerate()
                    .all(|(col, cell)| column_index(cell.line) == Some(col))
        });
        if !dense {
            return None;
        }
        let aligns: Vec<Option<Align>> = rows[0].cells.iter().map(|cell| cell.align).collect();
        if rows
            .iter()
            .any(|row| !row.cells.iter().map(|c| c.align).eq(aligns.iter().copied()))
        {
            return None;
        }

        let format_row = |cells: Vec<String>| format!("| {} |", cells.join(" | "));
        let row_text = |row: &TableRowGroup<'_>| {
            format_row(
                row.cells
                    .iter()
                    .map(|cell| self.render_inline(&cell.line.ops, depth))
                    .collect(),
            )
        };

        let mut lines = Vec::with_capacity(rows.len() + 2);
        if header_count == 1 {
            lines.push(row_text(&rows[0]));
        } else {
            lines.push(format_row(vec![String::new(); cols]));
        }
        lines.push(format_row(
            aligns
                .iter()
                .map(|align| {
                    match align {
                        Some(Align::Center) => ":---:",
                        Some(Align::Right) => "---:",
                        _ => "---",
                    }
                    .to_string()
                })
                .collect(),
        ));
        lines.extend(rows[header_count..].iter().map(row_text));
        Some(lines.join("\n"))
    }

    /// Lines written through the HTML serializer as one HTML block.
    fn html_lines(&self, lines: &[Line], depth: usize) -> String {
        let mut delta = Delta::new();
        for line in lines {
            for op in &line.ops {
                delta.push(op.clone());
            }
            delta.push(Op::text("\n", line.block_attributes()));
        }
        html_block(&self.html().render_document(&delta, depth))
    }

    /// Inline Markdown of a line. Ops sharing one link target become one link.
    fn render_inline(&self, ops: &[Op], depth: usize) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < ops.len() {
            let href = self.clean(ops[i].attributes.as_ref()).str_value(LINK).map(str::to_string);
            let end = i + ops[i..]
                .iter()
                .take_while(|op| {
                    self.clean(op.attributes.as_ref()).str_value(LINK) == href.as_deref()
                })
                .count();
            let run = self.render_run(&ops[i..end], depth, out.is_empty());
            match href {
                Some(href) => out.push_str(&format!("[{run}]({})", link_destination(&href))),
                None => out.push_str(&run),
            }
            i = end;
        }
        out
    }

    /// Delimiter-based formats are kept open across ops that share them. Whitespace at
    /// the edge of a formatted run is moved outside its delimiters.
    fn render_run(&self, ops: &[Op], depth: usize, line_start: bool) -> String {
        let mut out = String::new();
        let mut open: Vec<&'static str> = Vec::new();
        let mut pending = String::new();

        for op in ops {
            let attrs = self.clean(op.attributes.as_ref());
            let wanted = delimiters(&attrs);
            let (lead, core, trail) = match op.as_text() {
                Some(text) if attrs.flag(CODE) => ("", code_span(text), ""),
                Some(text) => {
                    let core = text.trim();
                    if core.is_empty() {
                        pending.push_str(text);
                        continue;
                    }
                    let start = text.len() - text.trim_start().len();
                    let escaped = escape_text(core, line_start && out.is_empty());
                    (&text[..start], escaped, &text[start + core.len()..])
                }
                None => ("", self.inline_embed(op, &attrs, depth), ""),
            };
            let core = self.wrap_html(core, &attrs);

            let keep = open
                .iter()
                .zip(&wanted)
                .take_while(|(a, b)| a == b)
                .count();
            while open.len() > keep {
                if let Some(delimiter) = open.pop() {
                    out.push_str(delimiter);
                }
            }
            out.push_str(&std::mem::take(&mut pending));
            out.push_str(lead);
            for delimiter in &wanted[keep..] {
                out.push_str(delimiter);
                open.push(*delimiter);
            }
            out.push_str(&core);
            pending.push_str(trail);
        }

        while let Some(delimiter) = open.pop() {
            out.push_str(delimiter);
        }
        out.push_str(&pending);
        out
    }

    /// Inline HTML for the formats Markdown has no delimiter for, plus registered
    /// custom formats.
    fn wrap_html(&self, mut text: String, attrs: &AttributeMap) -> String {
        if let Some(style) = color_style(attrs) {
            text = format!(
                "<span style=\"{}\">{text}</span>",
                encode_double_quoted_attribute(&style)
            );
        }
        for format in DECLARED_ORDER.iter().rev() {
            if matches!(
                format,
                InlineFormat::Bold | InlineFormat::Italic | InlineFormat::Strike | InlineFormat::Code
            ) {
                continue;
            }
            if let Some(tag) = format.html_tag(attrs) {
                text = format!("<{tag}>{text}</{tag}>");
            }
        }
        for (key, value) in attrs {
            if InlineFormat::is_builtin_key(key) {
                continue;
            }
            if let Some(wrapped) = self
                .attributes
                .get(key)
                .and_then(|format| format.to_markdown(value, &text))
            {
                text = wrapped;
            }
        }
        text
    }

    fn inline_embed(&self, op: &Op, attrs: &AttributeMap, depth: usize) -> String {
        let Some((kind, value)) = op.as_embed() else {
            return String::new();
        };
        match (kind, value.as_str()) {
            (IMAGE, Some(src)) if !has_html_only_image_attrs(attrs) => {
                let alt = attrs.str_value(ALT).unwrap_or_default();
                format!("![{}]({})", escape_text(alt, false), link_destination(src))
            }
            (FORMULA, _) if self.options.math == MathMode::Dollar => {
                format!("${}$", value_text(value))
            }
            (FOOTNOTE_REF, _) if is_footnote_id(&value_text(value)) => {
                format!("[^{}]", value_text(value))
            }
            _ => {
                let mut op = op.clone();
                if let Some(attributes) = op.attributes.as_mut() {
                    attributes.remove(LINK);
                }
                self.html().render_inline(std::slice::from_ref(&op), depth)
            }
        }
    }
}

/// Joins blocks with blank lines and adjacent list items with single newlines.
#[derive(Default)]
struct BlockWriter {
    out: String,
    last_was_item: bool,
}

impl BlockWriter {
    fn block(&mut self, text: String) {
        self.push(text, false);
    }

    fn item(&mut self, text: String) {
        self.push(text, true);
    }

    fn push(&mut self, text: String, item: bool) {
        if text.is_empty() {
            return;
        }
        if !self.out.is_empty() {
            self.out
                .push_str(if item && self.last_was_item { "\n" } else { "\n\n" });
        }
        self.out.push_str(&text);
        self.last_was_item = item;
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Ordinal of the current ordered item at each indent level. A level restarts when
/// its list type changes.
#[derive(Default)]
struct Ordinals {
    levels: Vec<Option<(ListType, usize)>>,
}

impl Ordinals {
    fn marker(&mut self, kind: ListType, indent: usize) -> String {
        self.levels.truncate(indent + 1);
        self.levels.resize(indent + 1, None);
        let number = match &mut self.levels[indent] {
            Some((current, n)) if *current == kind => {
                *n += 1;
                *n
            }
            slot => {
                *slot = Some((kind, 1));
                1
            }
        };
        match kind {
            ListType::Ordered => format!("{number}. "),
            ListType::Bullet => "- ".to_string(),
            ListType::Checked => "- [x] ".to_string(),
            ListType::Unchecked => "- [ ] ".to_string(),
        }
    }

    fn reset(&mut self) {
        self.levels.clear();
    }
}

/// Block attributes Markdown cannot express outside a list.
fn needs_html(attrs: &AttributeMap) -> bool {
    attrs.align().is_some() || attrs.indent() > 0
}

fn delimiters(attrs: &AttributeMap) -> Vec<&'static str> {
    [(BOLD, "**"), (ITALIC, "*"), (STRIKE, "~~")]
        .into_iter()
        .filter(|(key, _)| attrs.flag(key))
        .map(|(_, delimiter)| delimiter)
        .collect()
}

fn has_html_only_image_attrs(attrs: &AttributeMap) -> bool {
    attrs.contains_key(WIDTH)
        || attrs.contains_key(HEIGHT)
        || attrs.str_value(FLOAT).is_some_and(|float| float != "none")
}

/// Escape Markdown metacharacters in plain text. At the start of a line the block
/// markers (`#`, `-`, `+`, `=`, `1.`) are escaped too.
fn escape_text(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '>' | '|' | '~' | '&' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    if !line_start {
        return out;
    }
    // `\[` and `\]` opening a line are display math delimiters.
    if let Some(rest) = out.strip_prefix("\\[") {
        return format!("&#91;{rest}");
    }
    if let Some(rest) = out.strip_prefix("\\]") {
        return format!("&#93;{rest}");
    }
    if out.starts_with(|c| matches!(c, '#' | '-' | '+' | '=')) {
        return format!("\\{out}");
    }
    match ORDERED_MARKER.captures(&out) {
        Some(caps) => {
            let digits = caps[1].len();
            format!("{}\\{}", &out[..digits], &out[digits..])
        }
        None => out,
    }
}

fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn code_span(text: &str) -> String {
    let ticks = "`".repeat(longest_run(text, '`') + 1);
    let padded = text.starts_with('`')
        || text.ends_with('`')
        || (text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty());
    if padded {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

/// A fenced code block whose fence is longer than any backtick run in `text`.
fn fenced(info: &str, text: &str) -> String {
    let fence = "`".repeat(longest_run(text, '`').max(2) + 1);
    format!("{fence}{info}\n{text}\n{fence}")
}

fn link_destination(href: &str) -> String {
    if href
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'))
    {
        format!("<{}>", href.replace('<', "%3C").replace('>', "%3E"))
    } else {
        href.to_string()
    }
}

/// HTML on one line, as a block CommonMark passes through verbatim.
fn html_block(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let html = html.replace('\n', "&#10;");
    let tag: String = html
        .strip_prefix('<')
        .unwrap_or_default()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if HTML_BLOCK_TAGS.contains(&tag.as_str()) {
        html
    } else {
        format!("<div>{html}</div>")
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use serde_json::json;

    fn render(delta: &Delta) -> String {
        let options = MarkdownOptions::default();
        render_with(delta, &options)
    }

    fn render_with(delta: &Delta, options: &MarkdownOptions) -> String {
        let blocks = BlockRegistry::with_defaults();
        let attributes = AttributeRegistry::with_defaults();
        MarkdownSerializer::new(options, &blocks, &attributes).render_document(delta, 0)
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_lines() {
        let delta = Delta::new().insert("One\nTwo\n");
        assert_eq!(render(&delta), "One\n\nTwo");
    }

    #[test]
    fn test_escaping() {
        let delta = Delta::new().insert("# not *a* heading [x] $5\n");
        assert_eq!(render(&delta), "\\# not \\*a\\* heading \\[x\\] \\$5");
        let delta = Delta::new().insert("1. not a list\n");
        assert_eq!(render(&delta), "1\\. not a list");
    }

    #[test]
    fn test_line_start_escapes() {
        assert_eq!(render(&Delta::new().insert("[x]\n")), "&#91;x\\]");
        assert_eq!(render(&Delta::new().insert("] tail\n")), "&#93; tail");
        assert_eq!(render(&Delta::new().insert("  # x\n")).trim_start(), "\\# x");
        assert_eq!(render(&Delta::new().insert("\\(x\\)\n")), "\\\\(x\\\\)");
    }

    #[test]
    fn test_unlabelable_footnote_ref_falls_back_to_html() {
        let delta = Delta::new()
            .insert_embed("footnote-ref", json!("a b]"))
            .insert("\n");
        let markdown = render(&delta);
        assert!(!markdown.contains("[^"));
        assert!(markdown.contains("footnote-ref"));
    }

    #[test]
    fn test_literal_heading_id_is_escaped() {
        let delta = Delta::new()
            .insert("Title {#x}")
            .insert_with("\n", attrs! { "header" => 2 });
        assert_eq!(render(&delta), "## Title \\{#x}");
    }

    #[test]
    fn test_delimiters_stay_open_across_ops() {
        let delta = Delta::new()
            .insert_with("bold ", attrs! { "bold" => true })
            .insert_with("both", attrs! { "bold" => true, "italic" => true })
            .insert(" plain\n");
        assert_eq!(render(&delta), "**bold *both*** plain");
    }

    #[test]
    fn test_edge_whitespace_moves_outside_delimiters() {
        let delta = Delta::new()
            .insert("a")
            .insert_with(" b ", attrs! { "italic" => true })
            .insert("c\n");
        assert_eq!(render(&delta), "a *b* c");
    }

    #[test]
    fn test_code_span_is_not_escaped() {
        let delta = Delta::new()
            .insert_with("a*b`c", attrs! { "code" => true })
            .insert("\n");
        assert_eq!(render(&delta), "``a*b`c``");
    }

    #[test]
    fn test_html_only_formats() {
        let delta = Delta::new()
            .insert_with("u", attrs! { "underline" => true, "bold" => true })
            .insert(" ")
            .insert_with("2", attrs! { "script" => "super" })
            .insert(" ")
            .insert_with("red", attrs! { "color" => "red" })
            .insert("\n");
        assert_eq!(
            render(&delta),
            "**<u>u</u>** <sup>2</sup> <span style=\"color: red\">red</span>"
        );
    }

    #[test]
    fn test_link_groups_ops() {
        let delta = Delta::new()
            .insert("Visit ")
            .insert_with("the ", attrs! { "link" => "https://x.org" })
            .insert_with("site", attrs! { "link" => "https://x.org", "bold" => true })
            .insert("\n");
        assert_eq!(render(&delta), "Visit [the **site**](https://x.org)");
    }

    #[test]
    fn test_headings_and_ids() {
        let delta = Delta::new()
            .insert("Title")
            .insert_with("\n", attrs! { "header" => 1 })
            .insert("Usage")
            .insert_with("\n", attrs! { "header" => 2, "header-id" => "use" });
        assert_eq!(render(&delta), "# Title\n\n## Usage {#use}");
    }

    #[test]
    fn test_lists() {
        let item = |text: &str, list: &str, indent: usize| {
            Delta::new()
                .insert(text)
                .insert_with("\n", attrs! { "list" => list, "indent" => indent })
        };
        let mut delta = Delta::new();
        for (text, list, indent) in [
            ("one", "ordered", 0),
            ("two", "ordered", 0),
            ("nested", "bullet", 1),
            ("three", "ordered", 0),
            ("todo", "unchecked", 0),
            ("done", "checked", 0),
        ] {
            delta.extend(item(text, list, indent));
        }
        insta::assert_snapshot!(render(&delta), @r"
        1. one
        2. two
            - nested
        3. three
        - [ ] todo
        - [x] done
        ");
    }

    #[test]
    fn test_ordinals_restart_after_a_paragraph() {
        let delta = Delta::new()
            .insert("a")
            .insert_with("\n", attrs! { "list" => "ordered" })
            .insert("break\n")
            .insert("b")
            .insert_with("\n", attrs! { "list" => "ordered" });
        assert_eq!(render(&delta), "1. a\n\nbreak\n\n1. b");
    }

    #[test]
    fn test_blockquote_run() {
        let delta = Delta::new()
            .insert("before\n")
            .insert("one")
            .insert_with("\n", attrs! { "blockquote" => true })
            .insert("two")
            .insert_with("\n", attrs! { "blockquote" => true })
            .insert("after\n");
        assert_eq!(render(&delta), "before\n\n> one\n>\n> two\n\nafter");
    }

    #[test]
    fn test_code_fence_outgrows_backticks() {
        let delta = Delta::new()
            .insert("let s = \"```\";")
            .insert_with("\n", attrs! { "code-block" => "rust" });
        assert_eq!(render(&delta), "````rust\nlet s = \"```\";\n````");
    }

    #[test]
    fn test_alignment_falls_back_to_html() {
        let delta = Delta::new()
            .insert("centered")
            .insert_with("\n", attrs! { "align" => "center" });
        assert_eq!(
            render(&delta),
            "<p style=\"text-align: center\">centered</p>"
        );
    }

    #[test]
    fn test_embeds() {
        let delta = Delta::new()
            .insert_embed_with("image", json!("cat.png"), attrs! { "alt" => "A cat" })
            .insert(" and ")
            .insert_embed("formula", json!("e=mc^2"))
            .insert_embed("footnote-ref", json!("1"))
            .insert("\n")
            .insert_embed("divider", json!(true))
            .insert("\n")
            .insert_embed("formula", json!("x^2"))
            .insert("\n")
            .insert_embed("diagram", json!("graph TD; A-->B"))
            .insert("\n");
        insta::assert_snapshot!(render(&delta), @r"
        ![A cat](cat.png) and $e=mc^2$[^1]

        ---

        $$x^2$$

        ```mermaid
        graph TD; A-->B
        ```
        ");
    }

    #[test]
    fn test_floated_image_is_an_html_block() {
        let delta = Delta::new()
            .insert_embed_with("image", json!("a.png"), attrs! { "float" => "left" })
            .insert("\n")
            .insert("next\n");
        assert_eq!(
            render(&delta),
            "<div><img src=\"a.png\" style=\"float: left\"></div>\n\nnext"
        );
    }

    #[test]
    fn test_simple_table_as_gfm() {
        let cell = |row: usize, col: usize, text: &str, header: bool| {
            let mut attrs = attrs! { "table-row" => row, "table-col" => col };
            if header {
                attrs.insert("table-header".to_string(), json!(true));
            }
            Delta::new().insert(text).insert_with("\n", attrs)
        };
        let mut delta = Delta::new();
        delta.extend(cell(0, 0, "A", true));
        delta.extend(cell(0, 1, "B", true));
        delta.extend(cell(1, 0, "1", false));
        delta.extend(cell(1, 1, "a|b", false));
        insta::assert_snapshot!(render(&delta), @r"
        | A | B |
        | --- | --- |
        | 1 | a\|b |
        ");
    }

    #[test]
    fn test_ragged_simple_table_is_html() {
        let delta = Delta::new()
            .insert("A")
            .insert_with("\n", attrs! { "table-row" => 0, "table-col" => 0 })
            .insert("B")
            .insert_with("\n", attrs! { "table-row" => 0, "table-col" => 1 })
            .insert("C")
            .insert_with("\n", attrs! { "table-row" => 1, "table-col" => 0 });
        assert!(render(&delta).starts_with("<table>"));
    }

    #[test]
    fn test_block_without_markdown_form_is_html() {
        let data = json!({
            "type": "columns",
            "columns": [{"ops": [{"insert": "L\n"}]}, {"ops": [{"insert": "R\n"}]}]
        });
        let delta = Delta::new().insert_embed("block", data).insert("\n");
        let markdown = render(&delta);
        assert!(markdown.starts_with("<div class=\"columns columns-2\""));
        assert!(!markdown.contains('\n'));
    }

    #[test]
    fn test_empty_lines() {
        let delta = Delta::new().insert("a\n\nb\n");
        assert_eq!(render(&delta), "a\n\nb");
        let options = MarkdownOptions::default().with_preserve_empty_lines(true);
        assert_eq!(render_with(&delta, &options), "a\n\n<br>\n\nb");
    }

    #[test]
    fn test_math_as_html() {
        let options = MarkdownOptions::default().with_math(MathMode::Html);
        let delta = Delta::new()
            .insert("f ")
            .insert_embed("formula", json!("x"))
            .insert("\n");
        assert_eq!(
            render_with(&delta, &options),
            "f <span class=\"formula\" data-formula=\"x\">x</span>"
        );
    }
}
