use crate::common::common_subset;
use delta_babel::attrs;
use delta_babel::format::Format;
use delta_babel::formats::markdown::{MarkdownFormat, MarkdownOptions};
use delta_babel::Delta;
use serde_json::json;

#[test]
fn test_common_subset_round_trip() {
    let format = MarkdownFormat::default();
    let delta = common_subset();
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_common_subset_text() {
    let markdown = MarkdownFormat::default()
        .serialize(&common_subset())
        .expect("serialize markdown");
    insta::assert_snapshot!(markdown, @r"
    # Title

    Some **bold** and *slanted* text with [a link](https://example.com/) and `code`

    1. one
    2. two
        - nested

    > quoted

    ```rust
    let x = 1;
    ```

    end
    ");
}

#[test]
fn test_embeds_round_trip() {
    let delta = Delta::new()
        .insert_embed_with("image", json!("cat.png"), attrs! { "alt" => "cat" })
        .insert(" and ")
        .insert_embed("formula", json!("e^{i\\pi}"))
        .insert("\n")
        .insert_embed("divider", json!(true))
        .insert("\n")
        .insert("done")
        .insert_with("\n", attrs! { "list" => "checked" });
    let format = MarkdownFormat::default();
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_html_only_attributes_survive() {
    let delta = Delta::new()
        .insert_with("under", attrs! { "underline" => true })
        .insert(" ")
        .insert_with("red", attrs! { "color" => "red" })
        .insert("\n")
        .insert("middle")
        .insert_with("\n", attrs! { "align" => "center" });
    let format = MarkdownFormat::default();
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_alert_round_trip() {
    let alert = json!({
        "type": "alert",
        "alertType": "tip",
        "content": {"ops": [{"insert": "Use the "}, {"insert": "force", "attributes": {"bold": true}}, {"insert": "\n"}]}
    });
    let delta = Delta::new().insert_embed("block", alert).insert("\n");
    let format = MarkdownFormat::default();
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(markdown, "> [!TIP]\n> Use the **force**\n");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_preserved_empty_lines_round_trip() {
    let delta = Delta::new().insert("a\n\nb\n");
    let format = MarkdownFormat::new(MarkdownOptions::default().with_preserve_empty_lines(true));
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(markdown, "a\n\n<br>\n\nb\n");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_latex_delimiters_import() {
    let delta = MarkdownFormat::default()
        .parse("Euler \\(e^{i\\pi}\\)\n")
        .expect("parse markdown");
    assert_eq!(
        delta,
        Delta::new()
            .insert("Euler ")
            .insert_embed("formula", json!("e^{i\\pi}"))
            .insert("\n")
    );
}

#[test]
fn test_literal_latex_delimiters_round_trip() {
    let format = MarkdownFormat::default();
    let delta = Delta::new().insert("\\(x\\) and \\[y\\]\n");
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(markdown, "\\\\(x\\\\) and \\\\\\[y\\\\\\]\n");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_latex_in_code_span_round_trip() {
    let format = MarkdownFormat::default();
    let delta = Delta::new()
        .insert_with("\\(x\\)", attrs! { "code" => true })
        .insert(" and ")
        .insert_with("\\[y\\]", attrs! { "code" => true })
        .insert("\n");
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_bracketed_lines_stay_text() {
    let format = MarkdownFormat::default();
    let delta = Delta::new().insert("[x]\n").insert("]\n").insert("[\n");
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_literal_heading_id_round_trip() {
    let format = MarkdownFormat::default();
    let delta = Delta::new()
        .insert("Braces {#kept}")
        .insert_with("\n", attrs! { "header" => 2 })
        .insert("Real")
        .insert_with("\n", attrs! { "header" => 2, "header-id" => "real" });
    let markdown = format.serialize(&delta).expect("serialize markdown");
    assert_eq!(format.parse(&markdown).expect("parse markdown"), delta);
}

#[test]
fn test_indented_marker_is_not_a_heading() {
    let format = MarkdownFormat::default();
    let markdown = format
        .serialize(&Delta::new().insert("  # not a heading\n"))
        .expect("serialize markdown");
    let parsed = format.parse(&markdown).expect("parse markdown");
    let lines = delta_babel::split(&parsed);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].block_attributes().get("header").is_none());
    assert_eq!(lines[0].plain_text().trim(), "# not a heading");
}

#[test]
fn test_footnote_ids_that_break_labels_are_dropped() {
    let delta = Delta::new()
        .insert("text\n")
        .insert_embed(
            "block",
            json!({"type": "footnotes", "items": [
                {"id": "x] y", "content": {"ops": [{"insert": "note\n"}]}}
            ]}),
        )
        .insert("\n");
    let markdown = MarkdownFormat::default()
        .serialize(&delta)
        .expect("serialize markdown");
    assert!(!markdown.contains("[^"));
    assert!(markdown.starts_with("text"));
}
