use crate::common::{blocks, text_table};
use delta_babel::blocks::table::{
    CellPos, TableCell, TableData, MAX_COLSPAN, MAX_TABLE_POSITIONS,
};
use delta_babel::blocks::BlockRegistry;
use delta_babel::format::Format;
use delta_babel::formats::html::HtmlFormat;
use delta_babel::delta::Align;
use delta_babel::Delta;
use std::collections::BTreeMap;

fn table_document(table: &TableData) -> Delta {
    Delta::new()
        .insert_embed("block", table.to_value())
        .insert("\n")
}

#[test]
fn test_table_block_round_trip() {
    let mut cells = BTreeMap::new();
    cells.insert(
        CellPos::new(0, 0),
        Some(TableCell::new(Delta::new().insert("wide\n")).with_span(2, 1)),
    );
    cells.insert(CellPos::new(0, 1), None);
    for col in 0..2 {
        let content = Delta::new().insert(format!("c{col}\n"));
        cells.insert(CellPos::new(1, col), Some(TableCell::new(content)));
    }
    let table = TableData::from_cells(cells, 1, Some(vec![40.0, 60.0]), None).expect("valid grid");

    let format = HtmlFormat::default();
    let html = format.serialize(&table_document(&table)).expect("serialize html");
    assert!(html.contains("colspan=\"2\""));

    let parsed = format.parse(&html).expect("parse html");
    let found = blocks(&parsed);
    assert_eq!(found.len(), 1);
    assert_eq!(TableData::from_value(&found[0]).expect("valid table"), table);
}

#[test]
fn test_table_without_handler_is_simple_lines() {
    let html = HtmlFormat::default()
        .serialize(&table_document(&text_table(2, 2, 1)))
        .expect("serialize html");

    let parsed = HtmlFormat::default()
        .with_blocks(BlockRegistry::new())
        .parse(&html)
        .expect("parse html");
    assert!(blocks(&parsed).is_empty());

    let header_cells = delta_babel::split(&parsed)
        .iter()
        .filter(|line| line.block_attributes().get("table-header").is_some())
        .count();
    assert_eq!(header_cells, 2);
}

#[test]
fn test_invalid_table_block_is_skipped() {
    let delta = Delta::new()
        .insert_embed(
            "block",
            serde_json::json!({"type": "table", "cells": {"0:0": null}}),
        )
        .insert("\n")
        .insert("after\n");
    let html = HtmlFormat::default().serialize(&delta).expect("serialize html");
    assert_eq!(html, "<p>after</p>");
}

#[test]
fn test_huge_colspan_is_clamped() {
    let parsed = HtmlFormat::default()
        .parse("<table><tr><td colspan=\"20000000\">x</td></tr></table>")
        .expect("parse html");
    let found = blocks(&parsed);
    assert_eq!(found.len(), 1);
    let table = TableData::from_value(&found[0]).expect("valid table");
    assert_eq!(table.cols, MAX_COLSPAN);
}

#[test]
fn test_oversized_grid_reads_as_simple_lines() {
    let rows = MAX_TABLE_POSITIONS / MAX_COLSPAN + 1;
    let html = format!(
        "<table>{}</table>",
        format!("<tr><td colspan=\"{MAX_COLSPAN}\">a</td></tr>").repeat(rows)
    );
    let parsed = HtmlFormat::default().parse(&html).expect("parse html");
    assert!(blocks(&parsed).is_empty());

    let cells = delta_babel::split(&parsed)
        .iter()
        .filter(|line| line.block_attributes().get("table-row").is_some())
        .count();
    assert_eq!(cells, rows);
}

#[test]
fn test_alignment_round_trip_under_merged_header() {
    let mut cells = BTreeMap::new();
    cells.insert(
        CellPos::new(0, 0),
        Some(TableCell::new(Delta::new().insert("wide\n")).with_span(2, 1)),
    );
    cells.insert(CellPos::new(0, 1), None);
    let table = TableData::from_cells(cells, 1, None, Some(vec![Align::Left, Align::Center]))
        .expect("valid grid");

    let format = HtmlFormat::default();
    let html = format.serialize(&table_document(&table)).expect("serialize html");
    let parsed = format.parse(&html).expect("parse html");
    let found = blocks(&parsed);
    assert_eq!(found.len(), 1);
    assert_eq!(TableData::from_value(&found[0]).expect("valid table"), table);
}
