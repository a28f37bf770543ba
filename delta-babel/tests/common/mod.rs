//! Documents shared by the format tests.

use delta_babel::attrs;
use delta_babel::blocks::table::{CellPos, TableCell, TableData};
use delta_babel::Delta;
use serde_json::Value;
use std::collections::BTreeMap;

/// Lines every converter represents without loss.
pub fn common_subset() -> Delta {
    Delta::new()
        .insert("Title")
        .insert_with("\n", attrs! { "header" => 1 })
        .insert("Some ")
        .insert_with("bold", attrs! { "bold" => true })
        .insert(" and ")
        .insert_with("slanted", attrs! { "italic" => true })
        .insert(" text with ")
        .insert_with("a link", attrs! { "link" => "https://example.com/" })
        .insert(" and ")
        .insert_with("code", attrs! { "code" => true })
        .insert("\n")
        .insert("one")
        .insert_with("\n", attrs! { "list" => "ordered" })
        .insert("two")
        .insert_with("\n", attrs! { "list" => "ordered" })
        .insert("nested")
        .insert_with("\n", attrs! { "list" => "bullet", "indent" => 1 })
        .insert("quoted")
        .insert_with("\n", attrs! { "blockquote" => true })
        .insert("let x = 1;")
        .insert_with("\n", attrs! { "code-block" => "rust" })
        .insert("end\n")
}

/// A dense `rows × cols` table whose cells hold `r{row}c{col}`.
pub fn text_table(rows: usize, cols: usize, header_rows: usize) -> TableData {
    let mut cells = BTreeMap::new();
    for row in 0..rows {
        for col in 0..cols {
            let content = Delta::new().insert(format!("r{row}c{col}\n"));
            cells.insert(CellPos::new(row, col), Some(TableCell::new(content)));
        }
    }
    TableData::from_cells(cells, header_rows, None, None).expect("dense grid is valid")
}

/// The block embeds of a document, in order.
pub fn blocks(delta: &Delta) -> Vec<Value> {
    delta.ops.iter().filter_map(|op| op.as_block().cloned()).collect()
}
