//! Floating container (`inline-box`).

use super::{
    block_payload, fields, nested_delta, BlockDataError, BlockHandler, HtmlParseContext,
    HtmlRenderContext,
};
use crate::common::inline::parse_style;
use crate::delta::Delta;
use crate::formats::html::dom;
use markup5ever_rcdom::Handle;
use serde_json::Value;

pub const INLINE_BOX: &str = "inline-box";

const FLOAT: &str = "float";
const OVERFLOW: &str = "overflow";
const WIDTH: &str = "width";
const HEIGHT: &str = "height";
const CONTENT: &str = "content";

const FLOATS: [&str; 3] = ["left", "right", "none"];
const OVERFLOWS: [&str; 4] = ["visible", "hidden", "scroll", "auto"];

#[derive(Debug, Clone, PartialEq)]
pub struct InlineBoxData {
    pub float: String,
    pub overflow: String,
    /// CSS lengths, kept as written (`"240px"`, `"40%"`).
    pub width: Option<String>,
    pub height: Option<String>,
    pub content: Delta,
}

impl InlineBoxData {
    pub fn from_value(data: &Value) -> Result<Self, BlockDataError> {
        let map = fields(data)?;
        let keyword = |key: &'static str, allowed: &[&str], default: &str| {
            match map.get(key) {
                None | Some(Value::Null) => Ok(default.to_string()),
                Some(Value::String(s)) if allowed.contains(&s.as_str()) => Ok(s.clone()),
                Some(_) => Err(BlockDataError::InvalidField(key)),
            }
        };
        let length = |key: &'static str| match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if is_css_length(s) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(format!("{n}px"))),
            Some(_) => Err(BlockDataError::InvalidField(key)),
        };
        Ok(InlineBoxData {
            float: keyword(FLOAT, &FLOATS, "none")?,
            overflow: keyword(OVERFLOW, &OVERFLOWS, "visible")?,
            width: length(WIDTH)?,
            height: length(HEIGHT)?,
            content: nested_delta(map, CONTENT)?,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = block_payload(INLINE_BOX);
        map.insert(FLOAT.to_string(), Value::from(self.float.as_str()));
        map.insert(OVERFLOW.to_string(), Value::from(self.overflow.as_str()));
        if let Some(width) = &self.width {
            map.insert(WIDTH.to_string(), Value::from(width.as_str()));
        }
        if let Some(height) = &self.height {
            map.insert(HEIGHT.to_string(), Value::from(height.as_str()));
        }
        map.insert(CONTENT.to_string(), self.content.to_value());
        Value::Object(map)
    }
}

fn is_css_length(value: &str) -> bool {
    let number = ["px", "%", "em", "rem"]
        .iter()
        .find_map(|unit| value.strip_suffix(unit))
        .unwrap_or(value);
    !number.is_empty() && number.parse::<f64>().is_ok()
}

pub struct InlineBoxHandler;

impl BlockHandler for InlineBoxHandler {
    fn block_type(&self) -> &str {
        INLINE_BOX
    }

    fn validate(&self, data: &Value) -> bool {
        InlineBoxData::from_value(data).is_ok()
    }

    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        let boxed = InlineBoxData::from_value(data).ok()?;
        let mut html = format!(
            "<div class=\"inline-box\" data-float=\"{}\" data-overflow=\"{}\"",
            boxed.float, boxed.overflow
        );
        let mut style = Vec::new();
        if let Some(width) = &boxed.width {
            style.push(format!("width: {width}"));
        }
        if let Some(height) = &boxed.height {
            style.push(format!("height: {height}"));
        }
        if !style.is_empty() {
            html.push_str(&format!(" style=\"{}\"", style.join("; ")));
        }
        html.push('>');
        html.push_str(&ctx.render_delta(&boxed.content));
        html.push_str("</div>");
        Some(html)
    }

    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value> {
        let keyword = |attribute: &str, allowed: &[&str], default: &str| {
            dom::attr(element, attribute)
                .filter(|v| allowed.contains(&v.as_str()))
                .unwrap_or_else(|| default.to_string())
        };
        let style = dom::attr(element, "style")
            .map(|s| parse_style(&s))
            .unwrap_or_default();
        let length = |property: &str| {
            style
                .iter()
                .find(|(prop, value)| prop == property && is_css_length(value))
                .map(|(_, value)| value.clone())
        };
        Some(
            InlineBoxData {
                float: keyword("data-float", &FLOATS, "none"),
                overflow: keyword("data-overflow", &OVERFLOWS, "visible"),
                width: length(WIDTH),
                height: length(HEIGHT),
                content: ctx.parse_children(element),
            }
            .to_value(),
        )
    }

    fn nested_deltas(&self, data: &Value) -> Vec<Delta> {
        InlineBoxData::from_value(data)
            .map(|boxed| vec![boxed.content])
            .unwrap_or_default()
    }

    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value {
        match (InlineBoxData::from_value(&data), deltas.into_iter().next()) {
            (Ok(mut boxed), Some(content)) => {
                boxed.content = content;
                boxed.to_value()
            }
            _ => data,
        }
    }
}
