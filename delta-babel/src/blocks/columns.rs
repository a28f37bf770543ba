//! N-column layout.

use super::{
    block_payload, fields, parse_length, BlockDataError, BlockHandler, HtmlParseContext,
    HtmlRenderContext,
};
use crate::delta::Delta;
use crate::formats::html::dom;
use markup5ever_rcdom::Handle;
use serde_json::Value;

pub const COLUMNS: &str = "columns";

const WIDTHS: &str = "widths";
const COLUMN_CLASS: &str = "column";

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnsData {
    pub columns: Vec<Delta>,
    /// Percent widths, one per column.
    pub widths: Option<Vec<f64>>,
}

impl ColumnsData {
    pub fn from_value(data: &Value) -> Result<Self, BlockDataError> {
        let map = fields(data)?;
        let columns = map
            .get(COLUMNS)
            .ok_or(BlockDataError::MissingField(COLUMNS))?
            .as_array()
            .filter(|columns| !columns.is_empty())
            .ok_or(BlockDataError::InvalidField(COLUMNS))?
            .iter()
            .map(Delta::from_value)
            .collect::<Option<Vec<_>>>()
            .ok_or(BlockDataError::InvalidField(COLUMNS))?;
        let widths = match map.get(WIDTHS) {
            None | Some(Value::Null) => None,
            Some(Value::Array(widths)) => {
                let widths = widths
                    .iter()
                    .map(Value::as_f64)
                    .collect::<Option<Vec<_>>>()
                    .filter(|w| w.len() == columns.len())
                    .ok_or(BlockDataError::InvalidField(WIDTHS))?;
                Some(widths)
            }
            Some(_) => return Err(BlockDataError::InvalidField(WIDTHS)),
        };
        Ok(ColumnsData { columns, widths })
    }

    pub fn to_value(&self) -> Value {
        let mut map = block_payload(COLUMNS);
        map.insert(
            COLUMNS.to_string(),
            Value::Array(self.columns.iter().map(Delta::to_value).collect()),
        );
        if let Some(widths) = &self.widths {
            map.insert(WIDTHS.to_string(), Value::from(widths.clone()));
        }
        Value::Object(map)
    }
}

pub struct ColumnsHandler;

impl BlockHandler for ColumnsHandler {
    fn block_type(&self) -> &str {
        COLUMNS
    }

    fn validate(&self, data: &Value) -> bool {
        ColumnsData::from_value(data).is_ok()
    }

    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        let layout = ColumnsData::from_value(data).ok()?;
        let mut html = format!("<div class=\"columns columns-{}\"", layout.columns.len());
        if let Some(widths) = &layout.widths {
            let template: Vec<String> = widths.iter().map(|w| format!("{w}%")).collect();
            html.push_str(&format!(
                " style=\"grid-template-columns: {}\"",
                template.join(" ")
            ));
        }
        html.push('>');
        for column in &layout.columns {
            html.push_str(&format!(
                "<div class=\"{COLUMN_CLASS}\">{}</div>",
                ctx.render_delta(column)
            ));
        }
        html.push_str("</div>");
        Some(html)
    }

    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value> {
        let columns: Vec<Delta> = dom::element_children(element)
            .iter()
            .filter(|child| dom::has_class(child, COLUMN_CLASS))
            .map(|column| ctx.parse_children(column))
            .collect();
        if columns.is_empty() {
            return None;
        }
        let widths = dom::style_value(element, "grid-template-columns").and_then(|template| {
            template
                .split_whitespace()
                .map(parse_length)
                .collect::<Option<Vec<_>>>()
                .filter(|w| w.len() == columns.len())
        });
        Some(ColumnsData { columns, widths }.to_value())
    }

    fn nested_deltas(&self, data: &Value) -> Vec<Delta> {
        ColumnsData::from_value(data)
            .map(|layout| layout.columns)
            .unwrap_or_default()
    }

    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value {
        let Ok(mut layout) = ColumnsData::from_value(&data) else {
            return data;
        };
        for (column, delta) in layout.columns.iter_mut().zip(deltas) {
            *column = delta;
        }
        layout.to_value()
    }
}
