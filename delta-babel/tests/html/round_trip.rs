use crate::common::{blocks, common_subset};
use delta_babel::attrs;
use delta_babel::format::Format;
use delta_babel::formats::html::{HtmlFormat, HtmlOptions};
use delta_babel::{split, Delta};
use std::collections::HashMap;

#[test]
fn test_common_subset_round_trip() {
    let format = HtmlFormat::default();
    let delta = common_subset();
    let html = format.serialize(&delta).expect("serialize html");
    assert_eq!(format.parse(&html).expect("parse html"), delta);
}

#[test]
fn test_bold_link_list_and_table_scenario() {
    let delta = Delta::new()
        .insert_with("docs", attrs! { "bold" => true, "link" => "https://docs.rs" })
        .insert("\n")
        .insert("first")
        .insert_with("\n", attrs! { "list" => "ordered" })
        .insert("second")
        .insert_with("\n", attrs! { "list" => "ordered" })
        .insert("A")
        .insert_with("\n", attrs! { "table-row" => 0, "table-col" => 0, "table-header" => true })
        .insert("B")
        .insert_with("\n", attrs! { "table-row" => 0, "table-col" => 1, "table-header" => true })
        .insert("1")
        .insert_with("\n", attrs! { "table-row" => 1, "table-col" => 0 })
        .insert("2")
        .insert_with("\n", attrs! { "table-row" => 1, "table-col" => 1 });

    let format = HtmlFormat::default();
    let html = format.serialize(&delta).expect("serialize html");
    let parsed = format.parse(&html).expect("parse html");

    let first = &parsed.ops[0];
    assert_eq!(first.as_text(), Some("docs"));
    assert_eq!(first.attributes(), &attrs! { "bold" => true, "link" => "https://docs.rs" });

    let lines = split(&parsed);
    let items: Vec<String> = lines
        .iter()
        .filter(|line| line.block_attributes().get("list").is_some())
        .map(|line| line.plain_text())
        .collect();
    assert_eq!(items, vec!["first", "second"]);

    // With the table handler registered the table comes back as one table block.
    let tables = blocks(&parsed);
    assert_eq!(tables.len(), 1);
    let table = delta_babel::blocks::table::TableData::from_value(&tables[0]).expect("valid table");
    assert_eq!((table.rows, table.cols, table.header_rows), (2, 2, 1));
    assert_eq!(table.cells.len(), 4);
}

#[test]
fn test_hierarchical_numbering_option() {
    let mut delta = Delta::new();
    for (text, indent) in [("a", 0), ("b", 0), ("c", 1), ("d", 2), ("e", 1), ("f", 0)] {
        delta = delta
            .insert(text)
            .insert_with("\n", attrs! { "list" => "ordered", "indent" => indent });
    }
    let mut options = HashMap::new();
    options.insert("hierarchical-numbering".to_string(), "true".to_string());
    let html = HtmlFormat::default()
        .serialize_with_options(&delta, &options)
        .expect("serialize html");

    let numbers: Vec<&str> = html
        .split("data-number=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "2.1", "2.1.1", "2.2", "3"]);
}

#[test]
fn test_anchor_links_deduplicate() {
    let mut delta = Delta::new();
    for _ in 0..3 {
        delta = delta.insert("FAQ").insert_with("\n", attrs! { "header" => 2 });
    }
    let html = HtmlFormat::new(HtmlOptions::default().with_anchor_links(true))
        .serialize(&delta)
        .expect("serialize html");
    assert_eq!(
        html,
        r#"<h2 id="faq">FAQ</h2><h2 id="faq-1">FAQ</h2><h2 id="faq-2">FAQ</h2>"#
    );
}

#[test]
fn test_malformed_input_never_fails() {
    let format = HtmlFormat::default();
    let delta = format
        .parse("<p>open <b>bold <i>both</p><table><tr><td colspan=\"0\">x")
        .expect("parsing is infallible");
    assert!(!delta.is_empty());
}
