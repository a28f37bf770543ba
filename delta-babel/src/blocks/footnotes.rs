//! The collected footnote definitions of a document.

use super::{
    block_payload, fields, BlockDataError, BlockHandler, HtmlParseContext, HtmlRenderContext,
    MarkdownRenderContext,
};
use crate::delta::Delta;
use crate::formats::html::dom;
use markup5ever_rcdom::Handle;
use serde_json::{Map, Value};

pub const FOOTNOTES: &str = "footnotes";

const ITEMS: &str = "items";
const ID: &str = "id";
const CONTENT: &str = "content";
const ITEM_ID_PREFIX: &str = "fn-";
const BACKREF_CLASS: &str = "footnote-backref";

/// Whether `id` can be written as a `[^id]` label: non-empty, without whitespace,
/// control characters, brackets or backslashes.
pub fn is_footnote_id(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '[' | ']' | '\\'))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footnote {
    pub id: String,
    pub content: Delta,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FootnotesData {
    pub items: Vec<Footnote>,
}

impl FootnotesData {
    pub fn from_value(data: &Value) -> Result<Self, BlockDataError> {
        let items = fields(data)?
            .get(ITEMS)
            .ok_or(BlockDataError::MissingField(ITEMS))?
            .as_array()
            .ok_or(BlockDataError::InvalidField(ITEMS))?;
        let items = items
            .iter()
            .map(|item| {
                let item = item.as_object().ok_or(BlockDataError::InvalidField(ITEMS))?;
                let id = item
                    .get(ID)
                    .and_then(Value::as_str)
                    .filter(|id| is_footnote_id(id))
                    .ok_or(BlockDataError::InvalidField(ID))?;
                Ok(Footnote {
                    id: id.to_string(),
                    content: super::nested_delta(item, CONTENT)?,
                })
            })
            .collect::<Result<Vec<_>, BlockDataError>>()?;
        Ok(FootnotesData { items })
    }

    pub fn to_value(&self) -> Value {
        let items = self
            .items
            .iter()
            .map(|note| {
                let mut map = Map::new();
                map.insert(ID.to_string(), Value::from(note.id.as_str()));
                map.insert(CONTENT.to_string(), note.content.to_value());
                Value::Object(map)
            })
            .collect();
        let mut map = block_payload(FOOTNOTES);
        map.insert(ITEMS.to_string(), Value::Array(items));
        Value::Object(map)
    }
}

fn attribute_escape(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

pub struct FootnotesHandler;

impl BlockHandler for FootnotesHandler {
    fn block_type(&self) -> &str {
        FOOTNOTES
    }

    fn validate(&self, data: &Value) -> bool {
        FootnotesData::from_value(data).is_ok()
    }

    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        let notes = FootnotesData::from_value(data).ok()?;
        let mut html = String::from("<section class=\"footnotes\"><ol>");
        for note in &notes.items {
            let id = attribute_escape(&note.id);
            html.push_str(&format!(
                "<li id=\"{ITEM_ID_PREFIX}{id}\">{}<a href=\"#fnref-{id}\" class=\"{BACKREF_CLASS}\">\u{21a9}</a></li>",
                ctx.render_delta(&note.content)
            ));
        }
        html.push_str("</ol></section>");
        Some(html)
    }

    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value> {
        let items: Vec<Footnote> = dom::children_named(element, "ol")
            .iter()
            .flat_map(|ol| dom::children_named(ol, "li"))
            .filter_map(|li| {
                let id = dom::attr(&li, "id")?
                    .strip_prefix(ITEM_ID_PREFIX)
                    .filter(|id| is_footnote_id(id))?
                    .to_string();
                let children: Vec<Handle> = li
                    .children
                    .borrow()
                    .iter()
                    .filter(|child| !dom::has_class(child, BACKREF_CLASS))
                    .cloned()
                    .collect();
                let mut content = ctx.parse_nodes(&children);
                if content.is_empty() {
                    content = Delta::empty_line();
                }
                Some(Footnote { id, content })
            })
            .collect();
        if items.is_empty() {
            return None;
        }
        Some(FootnotesData { items }.to_value())
    }

    fn to_markdown(&self, data: &Value, ctx: &MarkdownRenderContext) -> Option<String> {
        let notes = FootnotesData::from_value(data).ok()?;
        let definitions: Vec<String> = notes
            .items
            .iter()
            .map(|note| {
                let body = ctx.render_delta(&note.content);
                let mut lines = body.trim_end().lines();
                let mut text = format!("[^{}]: {}", note.id, lines.next().unwrap_or_default());
                for line in lines {
                    text.push('\n');
                    if !line.is_empty() {
                        text.push_str("    ");
                        text.push_str(line);
                    }
                }
                text
            })
            .collect();
        Some(definitions.join("\n\n"))
    }

    fn nested_deltas(&self, data: &Value) -> Vec<Delta> {
        FootnotesData::from_value(data)
            .map(|notes| notes.items.into_iter().map(|n| n.content).collect())
            .unwrap_or_default()
    }

    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value {
        let Ok(mut notes) = FootnotesData::from_value(&data) else {
            return data;
        };
        for (note, delta) in notes.items.iter_mut().zip(deltas) {
            note.content = delta;
        }
        notes.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::markdown::MarkdownOptions;
    use serde_json::json;

    fn notes() -> Value {
        json!({"type": "footnotes", "items": [
            {"id": "1", "content": {"ops": [{"insert": "First\n"}]}},
            {"id": "src", "content": {"ops": [{"insert": "Second\nmore\n"}]}}
        ]})
    }

    #[test]
    fn test_validate() {
        assert!(FootnotesHandler.validate(&notes()));
        assert!(!FootnotesHandler.validate(&json!({"type": "footnotes"})));
        assert!(!FootnotesHandler.validate(&json!({"type": "footnotes", "items": [{"id": ""}]})));
        for id in ["a]b", "two words", "x[", "tab\t", "back\\slash"] {
            let data = json!({"type": "footnotes", "items": [
                {"id": id, "content": {"ops": [{"insert": "x\n"}]}}
            ]});
            assert!(!FootnotesHandler.validate(&data), "{id:?} accepted");
        }
    }

    #[test]
    fn test_footnote_ids() {
        assert!(is_footnote_id("1"));
        assert!(is_footnote_id("src-2.b"));
        assert!(!is_footnote_id(""));
        assert!(!is_footnote_id("a]"));
        assert!(!is_footnote_id("a b"));
    }

    #[test]
    fn test_to_markdown_indents_continuation_lines() {
        let options = MarkdownOptions::default();
        let render = |delta: &Delta| {
            crate::delta::split(delta)
                .iter()
                .map(|line| line.plain_text())
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        let ctx = MarkdownRenderContext::new(&options, 0, &render);
        insta::assert_snapshot!(FootnotesHandler.to_markdown(&notes(), &ctx).unwrap(), @r"
        [^1]: First

        [^src]: Second

            more
        ");
    }

    #[test]
    fn test_nested_deltas() {
        let deltas = FootnotesHandler.nested_deltas(&notes());
        assert_eq!(deltas.len(), 2);
        let replaced = FootnotesHandler.set_nested_deltas(
            notes(),
            vec![Delta::new().insert("A\n"), Delta::new().insert("B\n")],
        );
        assert_eq!(replaced["items"][1]["content"], json!({"ops": [{"insert": "B\n"}]}));
    }
}
