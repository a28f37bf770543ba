use crate::common::{blocks, text_table};
use delta_babel::blocks::table::{CellPos, TableData};
use delta_babel::format::Format;
use delta_babel::formats::markdown::MarkdownFormat;
use delta_babel::Delta;

fn table_document(table: &TableData) -> Delta {
    Delta::new()
        .insert_embed("block", table.to_value())
        .insert("\n")
}

fn markdown(table: &TableData) -> String {
    MarkdownFormat::default()
        .serialize(&table_document(table))
        .expect("serialize markdown")
}

#[test]
fn test_gfm_table_round_trip() {
    let table = text_table(2, 2, 1);
    let text = markdown(&table);
    assert!(!text.contains("<table"));

    let parsed = MarkdownFormat::default().parse(&text).expect("parse markdown");
    let found = blocks(&parsed);
    assert_eq!(found.len(), 1);
    assert_eq!(TableData::from_value(&found[0]).expect("valid table"), table);
}

#[test]
fn test_headerless_table_gets_empty_header() {
    let table = text_table(1, 2, 0);
    let text = markdown(&table);
    assert_eq!(text, "|  |  |\n| --- | --- |\n| r0c0 | r0c1 |\n");

    let parsed = MarkdownFormat::default().parse(&text).expect("parse markdown");
    let found = blocks(&parsed);
    assert_eq!(TableData::from_value(&found[0]).expect("valid table"), table);
}

#[test]
fn test_gfm_compatibility_decides_html_fallback() {
    let plain = text_table(2, 2, 1);
    assert!(!markdown(&plain).contains("<table"));

    let mut widths = plain.clone();
    widths.col_widths = Some(vec![50.0, 50.0]);
    assert!(markdown(&widths).contains("<table"));

    let mut merged = plain.clone();
    if let Some(Some(cell)) = merged.cells.get_mut(&CellPos::new(1, 0)) {
        cell.colspan = 2;
    }
    merged.cells.insert(CellPos::new(1, 1), None);
    assert!(markdown(&merged).contains("<table"));
}

#[test]
fn test_table_html_fallback_parses_back() {
    let mut table = text_table(2, 2, 1);
    table.col_widths = Some(vec![30.0, 70.0]);
    let text = markdown(&table);

    let parsed = MarkdownFormat::default().parse(&text).expect("parse markdown");
    let found = blocks(&parsed);
    assert_eq!(found.len(), 1);
    assert_eq!(TableData::from_value(&found[0]).expect("valid table"), table);
}
