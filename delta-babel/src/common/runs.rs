//! Look-ahead grouping of adjacent lines.
//!
//!     Some block structures span several lines in the document model but one element
//!     in the surface formats: every line of a simple table run carries `table-row` and
//!     `table-col`, every line of a code block run carries the same `code-block` value.
//!     Both emitters consume such runs greedily with the helpers below.

use crate::delta::attrs::{
    DIAGRAM, DIVIDER, DRAWIO, FLOAT, TABLE_COL, TABLE_COL_ALIGN, TABLE_HEADER, TABLE_ROW, VIDEO,
};
use crate::delta::{Align, AttributesExt, Line, Op, BLOCK_EMBED};
use serde_json::Value;

/// The embed of a line that renders as a block of its own: a divider, video, diagram,
/// drawio or block embed, or any embed floated left or right.
pub fn block_level_embed(line: &Line) -> Option<&Op> {
    let op = line.single_embed()?;
    let (kind, _) = op.as_embed()?;
    let block_level = matches!(kind, DIVIDER | VIDEO | DIAGRAM | DRAWIO | BLOCK_EMBED)
        || op
            .attributes()
            .str_value(FLOAT)
            .is_some_and(|float| float != "none");
    block_level.then_some(op)
}

/// End (exclusive) of the table run starting at `start`, or `None` if
/// `lines[start]` is not a table cell line.
pub fn table_run(lines: &[Line], start: usize) -> Option<usize> {
    let is_cell = |line: &Line| {
        line.attributes
            .as_ref()
            .is_some_and(|attrs| attrs.is_table_cell())
    };
    if !lines.get(start).is_some_and(is_cell) {
        return None;
    }
    let len = lines[start..].iter().take_while(|l| is_cell(l)).count();
    Some(start + len)
}

/// End (exclusive) of the code block run starting at `start`, or `None` if
/// `lines[start]` is not a code line. A run ends where the language changes.
pub fn code_block_run(lines: &[Line], start: usize) -> Option<usize> {
    let language = |line: &Line| -> Option<Option<String>> {
        line.attributes
            .as_ref()?
            .code_block()
            .map(|lang| lang.map(str::to_string))
    };
    let first = language(lines.get(start)?)?;
    let len = lines[start..]
        .iter()
        .take_while(|l| language(l).as_ref() == Some(&first))
        .count();
    Some(start + len)
}

/// One cell line of a simple table.
#[derive(Debug, Clone, Copy)]
pub struct CellLine<'a> {
    pub line: &'a Line,
    pub header: bool,
    pub align: Option<Align>,
}

/// Consecutive cell lines sharing one `table-row` value.
#[derive(Debug, Clone)]
pub struct TableRowGroup<'a> {
    pub cells: Vec<CellLine<'a>>,
}

impl TableRowGroup<'_> {
    /// A row is a header row when its cells carry `table-header`.
    pub fn is_header(&self) -> bool {
        self.cells.iter().any(|c| c.header)
    }
}

/// Group a table run by row index, preserving document order.
pub fn group_rows(run: &[Line]) -> Vec<TableRowGroup<'_>> {
    let mut rows: Vec<TableRowGroup<'_>> = Vec::new();
    let mut current_row: Option<&Value> = None;

    for line in run {
        let Some(attrs) = line.attributes.as_ref() else {
            continue;
        };
        let row = attrs.get(TABLE_ROW);
        let cell = CellLine {
            line,
            header: attrs.flag(TABLE_HEADER),
            align: attrs
                .str_value(TABLE_COL_ALIGN)
                .and_then(Align::parse)
                .filter(|a| *a != Align::Left),
        };
        match rows.last_mut() {
            Some(group) if current_row == row => group.cells.push(cell),
            _ => rows.push(TableRowGroup { cells: vec![cell] }),
        }
        current_row = row;
    }

    rows
}

/// Column index of a cell line, when it is numeric.
pub fn column_index(line: &Line) -> Option<usize> {
    let value = line.attributes.as_ref()?.get(TABLE_COL)?;
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
