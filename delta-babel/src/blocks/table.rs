//! Extended Table
//!
//!     A table block stores a sparse grid of cells keyed by `"row:col"`. Every position of
//!     the `rows × cols` rectangle is present. A position is either a cell (a nested
//!     document plus optional `colspan`/`rowspan`) or `null`, meaning a neighbouring span
//!     absorbed it.
//!
//!     ```json
//!     {"type": "table", "headerRows": 1,
//!      "cells": {"0:0": {"content": {"ops": [...]}, "colspan": 2}, "0:1": null, ...},
//!      "colWidths": [60, 40], "colAligns": ["left", "center"]}
//!     ```
//!
//!     Invariants checked by [`TableData::from_value`]:
//!
//!     - the dimensions are one past the largest row and column seen, and the grid
//!       holds exactly `rows * cols` positions;
//!     - each span rectangle stays inside the grid, covers only `null` positions, and
//!       shares none of them with another span;
//!     - every `null` position is covered by exactly one span;
//!     - `headerRows <= rows`, and `colWidths`/`colAligns` have one entry per column;
//!     - the grid holds at most [`MAX_TABLE_POSITIONS`] positions.
//!
//!     Parsing HTML reconstructs the dense grid from `colspan`/`rowspan` markup with an
//!     occupancy map, and backfills missing positions with empty cells, so irregular
//!     source tables still produce a valid grid. Spans are clamped to [`MAX_COLSPAN`] and
//!     [`MAX_ROWSPAN`], and a rowspan stops at the last row. A table that would grow past
//!     [`MAX_TABLE_POSITIONS`] is not rebuilt; the HTML parser reads it as simple table
//!     lines instead.
//!
//!     Column widths and alignments are written on `<colgroup>` columns. Alignments are
//!     repeated on each cell for readers that ignore `<col>` styles.

use super::{
    block_payload, fields, nested_delta, parse_length, BlockDataError, BlockHandler,
    HtmlParseContext, HtmlRenderContext, MarkdownRenderContext,
};
use crate::delta::{Align, Delta};
use crate::formats::html::dom;
use markup5ever_rcdom::Handle;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fmt::Write as _;

pub const TABLE: &str = "table";

const CELLS: &str = "cells";
const CONTENT: &str = "content";
const COLSPAN: &str = "colspan";
const ROWSPAN: &str = "rowspan";
const HEADER_ROWS: &str = "headerRows";
const COL_WIDTHS: &str = "colWidths";
const COL_ALIGNS: &str = "colAligns";

/// Largest `colspan` honoured when reading HTML.
pub const MAX_COLSPAN: usize = 1000;
/// Largest `rowspan` honoured when reading HTML.
pub const MAX_ROWSPAN: usize = 65534;
/// Upper bound on `rows * cols`.
pub const MAX_TABLE_POSITIONS: usize = 100_000;

/// Grid coordinate of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub fn new(row: usize, col: usize) -> Self {
        CellPos { row, col }
    }

    /// Parse a `"row:col"` key. Both parts must be plain decimal numbers.
    pub fn parse(key: &str) -> Option<Self> {
        let (row, col) = key.split_once(':')?;
        let number = |s: &str| -> Option<usize> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        };
        Some(CellPos::new(number(row)?, number(col)?))
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub content: Delta,
    pub colspan: usize,
    pub rowspan: usize,
}

impl TableCell {
    pub fn new(content: Delta) -> Self {
        TableCell {
            content,
            colspan: 1,
            rowspan: 1,
        }
    }

    /// A cell holding one empty line.
    pub fn empty() -> Self {
        Self::new(Delta::empty_line())
    }

    pub fn with_span(mut self, colspan: usize, rowspan: usize) -> Self {
        self.colspan = colspan;
        self.rowspan = rowspan;
        self
    }

    fn is_merged(&self) -> bool {
        self.colspan > 1 || self.rowspan > 1
    }
}

/// Typed form of a table block.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub rows: usize,
    pub cols: usize,
    /// `None` marks a position absorbed by a span.
    pub cells: BTreeMap<CellPos, Option<TableCell>>,
    pub header_rows: usize,
    pub col_widths: Option<Vec<f64>>,
    /// Absent when every column has the default alignment.
    pub col_aligns: Option<Vec<Align>>,
}

impl TableData {
    /// Build a table from its cells, deriving the dimensions. The result is checked
    /// against the grid invariants.
    pub fn from_cells(
        cells: BTreeMap<CellPos, Option<TableCell>>,
        header_rows: usize,
        col_widths: Option<Vec<f64>>,
        col_aligns: Option<Vec<Align>>,
    ) -> Result<Self, BlockDataError> {
        let rows = cells.keys().map(|p| p.row.saturating_add(1)).max().unwrap_or(0);
        let cols = cells.keys().map(|p| p.col.saturating_add(1)).max().unwrap_or(0);
        let table = TableData {
            rows,
            cols,
            cells,
            header_rows,
            col_widths,
            col_aligns: col_aligns.filter(|aligns| aligns.iter().any(|a| *a != Align::Left)),
        };
        table.check()?;
        Ok(table)
    }

    pub fn from_value(data: &Value) -> Result<Self, BlockDataError> {
        let map = fields(data)?;
        let raw_cells = map
            .get(CELLS)
            .ok_or(BlockDataError::MissingField(CELLS))?
            .as_object()
            .ok_or(BlockDataError::InvalidField(CELLS))?;

        let mut cells = BTreeMap::new();
        for (key, value) in raw_cells {
            let pos = CellPos::parse(key).ok_or_else(|| BlockDataError::MalformedKey(key.clone()))?;
            let cell = match value {
                Value::Null => None,
                Value::Object(cell) => Some(parse_cell(cell)?),
                _ => return Err(BlockDataError::InvalidField(CELLS)),
            };
            if cells.insert(pos, cell).is_some() {
                return Err(BlockDataError::Grid(format!("duplicate cell {pos}")));
            }
        }

        let header_rows = match map.get(HEADER_ROWS) {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_u64()
                .ok_or(BlockDataError::InvalidField(HEADER_ROWS))? as usize,
        };
        let col_widths = match map.get(COL_WIDTHS) {
            None | Some(Value::Null) => None,
            Some(Value::Array(widths)) => Some(
                widths
                    .iter()
                    .map(Value::as_f64)
                    .collect::<Option<Vec<_>>>()
                    .ok_or(BlockDataError::InvalidField(COL_WIDTHS))?,
            ),
            Some(_) => return Err(BlockDataError::InvalidField(COL_WIDTHS)),
        };
        let col_aligns = match map.get(COL_ALIGNS) {
            None | Some(Value::Null) => None,
            Some(Value::Array(aligns)) => Some(
                aligns
                    .iter()
                    .map(|a| a.as_str().and_then(Align::parse))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(BlockDataError::InvalidField(COL_ALIGNS))?,
            ),
            Some(_) => return Err(BlockDataError::InvalidField(COL_ALIGNS)),
        };

        Self::from_cells(cells, header_rows, col_widths, col_aligns)
    }

    fn check(&self) -> Result<(), BlockDataError> {
        if self.cells.is_empty() {
            return Err(BlockDataError::Grid("table has no cells".to_string()));
        }
        let positions = self
            .rows
            .checked_mul(self.cols)
            .filter(|n| *n <= MAX_TABLE_POSITIONS)
            .ok_or_else(|| {
                BlockDataError::Grid(format!(
                    "a {}x{} grid exceeds {MAX_TABLE_POSITIONS} positions",
                    self.rows, self.cols
                ))
            })?;
        if self.cells.len() != positions {
            return Err(BlockDataError::Grid(format!(
                "expected {} positions for a {}x{} grid, found {}",
                positions,
                self.rows,
                self.cols,
                self.cells.len()
            )));
        }

        let fits = |start: usize, span: usize, limit: usize| {
            start.checked_add(span).is_some_and(|end| end <= limit)
        };
        let mut claimed: HashMap<CellPos, CellPos> = HashMap::new();
        for (pos, cell) in &self.cells {
            let Some(cell) = cell else { continue };
            if !fits(pos.row, cell.rowspan, self.rows) || !fits(pos.col, cell.colspan, self.cols) {
                return Err(BlockDataError::Grid(format!(
                    "span of {pos} leaves the grid"
                )));
            }
            for row in pos.row..pos.row + cell.rowspan {
                for col in pos.col..pos.col + cell.colspan {
                    let covered = CellPos::new(row, col);
                    if covered == *pos {
                        continue;
                    }
                    if !matches!(self.cells.get(&covered), Some(None)) {
                        return Err(BlockDataError::Grid(format!(
                            "{covered} lies under the span of {pos} but is not null"
                        )));
                    }
                    if let Some(other) = claimed.insert(covered, *pos) {
                        return Err(BlockDataError::Grid(format!(
                            "{covered} is covered by both {other} and {pos}"
                        )));
                    }
                }
            }
        }

        if let Some(orphan) = self
            .cells
            .iter()
            .find(|(pos, cell)| cell.is_none() && !claimed.contains_key(pos))
        {
            return Err(BlockDataError::Grid(format!(
                "{} is null but no span covers it",
                orphan.0
            )));
        }

        if self.header_rows > self.rows {
            return Err(BlockDataError::InvalidField(HEADER_ROWS));
        }
        if self.col_widths.as_ref().is_some_and(|w| w.len() != self.cols) {
            return Err(BlockDataError::InvalidField(COL_WIDTHS));
        }
        if self.col_aligns.as_ref().is_some_and(|a| a.len() != self.cols) {
            return Err(BlockDataError::InvalidField(COL_ALIGNS));
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        let mut cells = Map::new();
        for (pos, cell) in &self.cells {
            let value = match cell {
                None => Value::Null,
                Some(cell) => {
                    let mut map = Map::new();
                    map.insert(CONTENT.to_string(), cell.content.to_value());
                    if cell.colspan > 1 {
                        map.insert(COLSPAN.to_string(), Value::from(cell.colspan));
                    }
                    if cell.rowspan > 1 {
                        map.insert(ROWSPAN.to_string(), Value::from(cell.rowspan));
                    }
                    Value::Object(map)
                }
            };
            cells.insert(pos.to_string(), value);
        }

        let mut map = block_payload(TABLE);
        map.insert(CELLS.to_string(), Value::Object(cells));
        map.insert(HEADER_ROWS.to_string(), Value::from(self.header_rows));
        if let Some(widths) = &self.col_widths {
            map.insert(COL_WIDTHS.to_string(), Value::from(widths.clone()));
        }
        if let Some(aligns) = &self.col_aligns {
            let aligns: Vec<Value> = aligns.iter().map(|a| Value::from(a.as_str())).collect();
            map.insert(COL_ALIGNS.to_string(), Value::Array(aligns));
        }
        Value::Object(map)
    }

    /// Whether the table has a native GFM form: no column widths, no merged cells and
    /// no absorbed positions.
    pub fn is_gfm_compatible(&self) -> bool {
        self.col_widths.is_none()
            && self
                .cells
                .values()
                .all(|cell| cell.as_ref().is_some_and(|c| !c.is_merged()))
    }

    fn align(&self, col: usize) -> Align {
        self.col_aligns
            .as_ref()
            .and_then(|aligns| aligns.get(col).copied())
            .unwrap_or(Align::Left)
    }

    pub fn to_html(&self, ctx: &HtmlRenderContext) -> String {
        let mut html = String::from("<table>");

        if self.col_widths.is_some() || self.col_aligns.is_some() {
            let unit = ctx.options.table_width.suffix();
            html.push_str("<colgroup>");
            for col in 0..self.cols {
                let mut style = Vec::new();
                if let Some(width) = self.col_widths.as_ref().and_then(|w| w.get(col)) {
                    style.push(format!("width: {width}{unit}"));
                }
                let align = self.align(col);
                if align != Align::Left {
                    style.push(format!("text-align: {}", align.as_str()));
                }
                if style.is_empty() {
                    html.push_str("<col>");
                } else {
                    let _ = write!(html, "<col style=\"{}\">", style.join("; "));
                }
            }
            html.push_str("</colgroup>");
        }

        let header_rows = self.header_rows.min(self.rows);
        if header_rows > 0 {
            html.push_str("<thead>");
            for row in 0..header_rows {
                self.render_row(&mut html, row, "th", ctx);
            }
            html.push_str("</thead>");
        }
        if self.rows > header_rows {
            html.push_str("<tbody>");
            for row in header_rows..self.rows {
                self.render_row(&mut html, row, "td", ctx);
            }
            html.push_str("</tbody>");
        }

        html.push_str("</table>");
        html
    }

    fn render_row(&self, html: &mut String, row: usize, tag: &str, ctx: &HtmlRenderContext) {
        html.push_str("<tr>");
        for col in 0..self.cols {
            let Some(Some(cell)) = self.cells.get(&CellPos::new(row, col)) else {
                continue;
            };
            let _ = write!(html, "<{tag}");
            if cell.colspan > 1 {
                let _ = write!(html, " colspan=\"{}\"", cell.colspan);
            }
            if cell.rowspan > 1 {
                let _ = write!(html, " rowspan=\"{}\"", cell.rowspan);
            }
            let align = self.align(col);
            if align != Align::Left {
                let _ = write!(html, " style=\"text-align: {}\"", align.as_str());
            }
            let _ = write!(html, ">{}</{tag}>", ctx.render_delta(&cell.content));
        }
        html.push_str("</tr>");
    }

    /// Reconstruct a table from a `<table>` element.
    pub fn from_html(element: &Handle, ctx: &HtmlParseContext) -> Option<Self> {
        let mut rows: Vec<(Handle, bool)> = Vec::new();
        let mut col_widths: Option<Vec<f64>> = None;
        let mut colgroup_aligns: Option<Vec<Align>> = None;

        for child in dom::element_children(element) {
            match dom::tag_name(&child).as_deref() {
                Some("thead") => rows.extend(dom::children_named(&child, "tr").into_iter().map(|tr| (tr, true))),
                Some("tbody") | Some("tfoot") => rows.extend(dom::children_named(&child, "tr").into_iter().map(|tr| (tr, false))),
                Some("tr") => rows.push((child, false)),
                Some("colgroup") => {
                    col_widths = column_widths(&child);
                    colgroup_aligns = column_aligns(&child);
                }
                _ => {}
            }
        }

        let mut header_rows = rows.iter().take_while(|(_, header)| *header).count();
        if header_rows == 0 {
            header_rows = rows
                .iter()
                .take_while(|(tr, _)| {
                    let cells = row_cells(tr);
                    !cells.is_empty()
                        && cells.iter().all(|c| dom::tag_name(c).as_deref() == Some("th"))
                })
                .count();
        }

        let mut occupied: HashSet<CellPos> = HashSet::new();
        let mut cells: BTreeMap<CellPos, Option<TableCell>> = BTreeMap::new();
        let mut aligns: BTreeMap<usize, Align> = BTreeMap::new();
        let (mut row_count, mut col_count) = (0, 0);

        for (row, (tr, _)) in rows.iter().enumerate() {
            let mut col = 0;
            for cell in row_cells(tr) {
                while occupied.contains(&CellPos::new(row, col)) {
                    col += 1;
                }

                // Spans are clipped where they would run into a position that an
                // earlier row already occupies.
                let colspan = (1..span_attr(&cell, COLSPAN).min(MAX_COLSPAN))
                    .take_while(|dc| !occupied.contains(&CellPos::new(row, col + dc)))
                    .count()
                    + 1;
                let rowspan_limit = span_attr(&cell, ROWSPAN)
                    .min(MAX_ROWSPAN)
                    .min(rows.len() - row)
                    .min(MAX_TABLE_POSITIONS / colspan + 1);
                let mut rowspan = 1;
                while rowspan < rowspan_limit
                    && (0..colspan)
                        .all(|dc| !occupied.contains(&CellPos::new(row + rowspan, col + dc)))
                {
                    rowspan += 1;
                }
                if occupied.len() + rowspan * colspan > MAX_TABLE_POSITIONS {
                    tracing::warn!(
                        limit = MAX_TABLE_POSITIONS,
                        "table grid too large, reading it as simple lines"
                    );
                    return None;
                }

                if let Some(align) = dom::style_value(&cell, "text-align")
                    .and_then(|a| Align::parse(&a))
                    .filter(|a| *a != Align::Left)
                {
                    aligns.entry(col).or_insert(align);
                }

                let content = ctx.parse_children(&cell);
                cells.insert(
                    CellPos::new(row, col),
                    Some(TableCell::new(content).with_span(colspan, rowspan)),
                );
                for dr in 0..rowspan {
                    for dc in 0..colspan {
                        let pos = CellPos::new(row + dr, col + dc);
                        occupied.insert(pos);
                        if dr > 0 || dc > 0 {
                            cells.insert(pos, None);
                        }
                    }
                }

                row_count = row_count.max(row + rowspan);
                col_count = col_count.max(col + colspan);
                col += colspan;
            }
            row_count = row_count.max(row + 1);
        }

        if col_count == 0 {
            return None;
        }
        if row_count
            .checked_mul(col_count)
            .map_or(true, |n| n > MAX_TABLE_POSITIONS)
        {
            tracing::warn!(
                rows = row_count,
                cols = col_count,
                "table grid too large, reading it as simple lines"
            );
            return None;
        }

        for row in 0..row_count {
            for col in 0..col_count {
                cells
                    .entry(CellPos::new(row, col))
                    .or_insert_with(|| Some(TableCell::empty()));
            }
        }

        let col_aligns = colgroup_aligns
            .filter(|colgroup| colgroup.len() == col_count)
            .or_else(|| {
                (!aligns.is_empty()).then(|| {
                    (0..col_count)
                        .map(|col| aligns.get(&col).copied().unwrap_or(Align::Left))
                        .collect()
                })
            });
        let col_widths = col_widths.filter(|widths| {
            let matches = widths.len() == col_count;
            if !matches {
                tracing::debug!(
                    widths = widths.len(),
                    columns = col_count,
                    "ignoring colgroup that does not match the column count"
                );
            }
            matches
        });

        match Self::from_cells(cells, header_rows.min(row_count), col_widths, col_aligns) {
            Ok(table) => Some(table),
            Err(err) => {
                tracing::warn!(error = %err, "could not rebuild table grid");
                None
            }
        }
    }

    /// GFM table text, or `None` when the table has no native GFM form.
    pub fn to_markdown(&self, ctx: &MarkdownRenderContext) -> Option<String> {
        if !self.is_gfm_compatible() {
            return None;
        }

        let cell_text = |row: usize, col: usize| -> String {
            match self.cells.get(&CellPos::new(row, col)) {
                Some(Some(cell)) => markdown_cell(&ctx.render_delta(&cell.content)),
                _ => String::new(),
            }
        };
        let format_row = |cells: Vec<String>| format!("| {} |", cells.join(" | "));

        let mut lines = Vec::with_capacity(self.rows + 2);
        let body_start = if self.header_rows == 0 {
            lines.push(format_row(vec![String::new(); self.cols]));
            0
        } else {
            lines.push(format_row((0..self.cols).map(|col| cell_text(0, col)).collect()));
            1
        };

        let separator = (0..self.cols)
            .map(|col| {
                match self.col_aligns.as_ref().and_then(|a| a.get(col)) {
                    Some(Align::Left) => ":---",
                    Some(Align::Center) => ":---:",
                    Some(Align::Right) => "---:",
                    Some(Align::Justify) | None => "---",
                }
                .to_string()
            })
            .collect();
        lines.push(format_row(separator));

        for row in body_start..self.rows {
            lines.push(format_row((0..self.cols).map(|col| cell_text(row, col)).collect()));
        }

        Some(lines.join("\n"))
    }
}

fn parse_cell(cell: &Map<String, Value>) -> Result<TableCell, BlockDataError> {
    let span = |key: &'static str| -> Result<usize, BlockDataError> {
        match cell.get(key) {
            None | Some(Value::Null) => Ok(1),
            Some(value) => match value.as_u64() {
                Some(n) if n >= 1 => Ok(n as usize),
                _ => Err(BlockDataError::InvalidField(key)),
            },
        }
    };
    Ok(TableCell {
        content: nested_delta(cell, CONTENT)?,
        colspan: span(COLSPAN)?,
        rowspan: span(ROWSPAN)?,
    })
}

fn row_cells(tr: &Handle) -> Vec<Handle> {
    dom::element_children(tr)
        .into_iter()
        .filter(|c| matches!(dom::tag_name(c).as_deref(), Some("td") | Some("th")))
        .collect()
}

fn span_attr(cell: &Handle, name: &str) -> usize {
    dom::attr(cell, name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

fn column_widths(colgroup: &Handle) -> Option<Vec<f64>> {
    let cols = dom::children_named(colgroup, "col");
    if cols.is_empty() {
        return None;
    }
    cols.iter()
        .map(|col| {
            dom::style_value(col, "width")
                .or_else(|| dom::attr(col, "width"))
                .and_then(|w| parse_length(&w))
        })
        .collect()
}

/// Alignments from `<col>` styles, `None` when every column is left aligned.
fn column_aligns(colgroup: &Handle) -> Option<Vec<Align>> {
    let aligns: Vec<Align> = dom::children_named(colgroup, "col")
        .iter()
        .map(|col| {
            dom::style_value(col, "text-align")
                .and_then(|a| Align::parse(&a))
                .unwrap_or(Align::Left)
        })
        .collect();
    aligns.iter().any(|a| *a != Align::Left).then_some(aligns)
}

/// One-line Markdown for a table cell.
fn markdown_cell(markdown: &str) -> String {
    markdown
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Handler for `table` blocks.
pub struct TableHandler;

impl BlockHandler for TableHandler {
    fn block_type(&self) -> &str {
        TABLE
    }

    fn validate(&self, data: &Value) -> bool {
        match TableData::from_value(data) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "invalid table data");
                false
            }
        }
    }

    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        Some(TableData::from_value(data).ok()?.to_html(ctx))
    }

    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value> {
        TableData::from_html(element, ctx).map(|table| table.to_value())
    }

    fn to_markdown(&self, data: &Value, ctx: &MarkdownRenderContext) -> Option<String> {
        TableData::from_value(data).ok()?.to_markdown(ctx)
    }

    fn normalize(&self, data: Value) -> Value {
        match TableData::from_value(&data) {
            Ok(table) => table.to_value(),
            Err(_) => data,
        }
    }

    fn nested_deltas(&self, data: &Value) -> Vec<Delta> {
        TableData::from_value(data)
            .map(|table| {
                table
                    .cells
                    .into_values()
                    .flatten()
                    .map(|cell| cell.content)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value {
        let Ok(mut table) = TableData::from_value(&data) else {
            return data;
        };
        let mut deltas = deltas.into_iter();
        for cell in table.cells.values_mut().flatten() {
            match deltas.next() {
                Some(delta) => cell.content = delta,
                None => break,
            }
        }
        table.to_value()
    }
}
