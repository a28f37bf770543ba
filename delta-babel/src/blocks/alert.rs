//! GitHub-style callouts (`> [!NOTE]`).

use super::{
    block_payload, fields, nested_delta, BlockDataError, BlockHandler, HtmlParseContext,
    HtmlRenderContext, MarkdownRenderContext,
};
use crate::delta::Delta;
use crate::formats::html::dom;
use markup5ever_rcdom::Handle;
use serde_json::Value;

pub const ALERT: &str = "alert";

const ALERT_TYPE: &str = "alertType";
const CONTENT: &str = "content";
const CLASS_PREFIX: &str = "markdown-alert-";
const TITLE_CLASS: &str = "markdown-alert-title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AlertType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "note" => Some(AlertType::Note),
            "tip" => Some(AlertType::Tip),
            "important" => Some(AlertType::Important),
            "warning" => Some(AlertType::Warning),
            "caution" => Some(AlertType::Caution),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Note => "note",
            AlertType::Tip => "tip",
            AlertType::Important => "important",
            AlertType::Warning => "warning",
            AlertType::Caution => "caution",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertType::Note => "Note",
            AlertType::Tip => "Tip",
            AlertType::Important => "Important",
            AlertType::Warning => "Warning",
            AlertType::Caution => "Caution",
        }
    }

    /// Marker used on the first line of the Markdown quote.
    pub fn marker(&self) -> String {
        format!("[!{}]", self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertData {
    pub alert_type: AlertType,
    pub content: Delta,
}

impl AlertData {
    pub fn from_value(data: &Value) -> Result<Self, BlockDataError> {
        let map = fields(data)?;
        let alert_type = map
            .get(ALERT_TYPE)
            .ok_or(BlockDataError::MissingField(ALERT_TYPE))?
            .as_str()
            .and_then(AlertType::parse)
            .ok_or(BlockDataError::InvalidField(ALERT_TYPE))?;
        Ok(AlertData {
            alert_type,
            content: nested_delta(map, CONTENT)?,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = block_payload(ALERT);
        map.insert(ALERT_TYPE.to_string(), Value::from(self.alert_type.as_str()));
        map.insert(CONTENT.to_string(), self.content.to_value());
        Value::Object(map)
    }
}

pub struct AlertHandler;

impl BlockHandler for AlertHandler {
    fn block_type(&self) -> &str {
        ALERT
    }

    fn validate(&self, data: &Value) -> bool {
        AlertData::from_value(data).is_ok()
    }

    fn to_html(&self, data: &Value, ctx: &HtmlRenderContext) -> Option<String> {
        let alert = AlertData::from_value(data).ok()?;
        let kind = alert.alert_type;
        Some(format!(
            "<div class=\"markdown-alert {CLASS_PREFIX}{}\"><p class=\"{TITLE_CLASS}\">{}</p>{}</div>",
            kind.as_str(),
            kind.title(),
            ctx.render_delta(&alert.content)
        ))
    }

    fn from_html(&self, element: &Handle, ctx: &HtmlParseContext) -> Option<Value> {
        let alert_type = dom::classes(element)
            .iter()
            .find_map(|c| c.strip_prefix(CLASS_PREFIX).and_then(AlertType::parse))?;
        let children: Vec<Handle> = element
            .children
            .borrow()
            .iter()
            .filter(|child| !dom::has_class(child, TITLE_CLASS))
            .cloned()
            .collect();
        let mut content = ctx.parse_nodes(&children);
        if content.is_empty() {
            content = Delta::empty_line();
        }
        Some(
            AlertData {
                alert_type,
                content,
            }
            .to_value(),
        )
    }

    fn to_markdown(&self, data: &Value, ctx: &MarkdownRenderContext) -> Option<String> {
        let alert = AlertData::from_value(data).ok()?;
        let body = ctx.render_delta(&alert.content);
        let mut lines = vec![format!("> {}", alert.alert_type.marker())];
        for line in body.trim_end().lines() {
            if line.is_empty() {
                lines.push(">".to_string());
            } else {
                lines.push(format!("> {line}"));
            }
        }
        Some(lines.join("\n"))
    }

    fn nested_deltas(&self, data: &Value) -> Vec<Delta> {
        AlertData::from_value(data)
            .map(|alert| vec![alert.content])
            .unwrap_or_default()
    }

    fn set_nested_deltas(&self, data: Value, deltas: Vec<Delta>) -> Value {
        match (AlertData::from_value(&data), deltas.into_iter().next()) {
            (Ok(mut alert), Some(content)) => {
                alert.content = content;
                alert.to_value()
            }
            _ => data,
        }
    }
}
