//! Attribute keys and typed accessors.

use super::AttributeMap;
use serde_json::Value;

// Block attributes (live on the terminating newline)
pub const HEADER: &str = "header";
pub const HEADER_ID: &str = "header-id";
pub const LIST: &str = "list";
pub const INDENT: &str = "indent";
pub const BLOCKQUOTE: &str = "blockquote";
pub const CODE_BLOCK: &str = "code-block";
pub const ALIGN: &str = "align";
pub const TABLE_ROW: &str = "table-row";
pub const TABLE_COL: &str = "table-col";
pub const TABLE_HEADER: &str = "table-header";
pub const TABLE_COL_ALIGN: &str = "table-col-align";

// Inline attributes
pub const BOLD: &str = "bold";
pub const ITALIC: &str = "italic";
pub const UNDERLINE: &str = "underline";
pub const STRIKE: &str = "strike";
pub const CODE: &str = "code";
pub const SCRIPT: &str = "script";
pub const MARK: &str = "mark";
pub const KBD: &str = "kbd";
pub const LINK: &str = "link";
pub const COLOR: &str = "color";
pub const BACKGROUND: &str = "background";

// Embed attributes
pub const ALT: &str = "alt";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const FLOAT: &str = "float";

// Simple embed kinds
pub const IMAGE: &str = "image";
pub const VIDEO: &str = "video";
pub const FORMULA: &str = "formula";
pub const DIVIDER: &str = "divider";
pub const FOOTNOTE_REF: &str = "footnote-ref";
pub const DIAGRAM: &str = "diagram";
pub const DRAWIO: &str = "drawio";

/// Value of the `list` block attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Ordered,
    Bullet,
    Checked,
    Unchecked,
}

impl ListType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ordered" => Some(ListType::Ordered),
            "bullet" => Some(ListType::Bullet),
            "checked" => Some(ListType::Checked),
            "unchecked" => Some(ListType::Unchecked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Ordered => "ordered",
            ListType::Bullet => "bullet",
            ListType::Checked => "checked",
            ListType::Unchecked => "unchecked",
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, ListType::Ordered)
    }
}

/// Value of the `align` attribute. Left is the default and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "left" => Some(Align::Left),
            "center" => Some(Align::Center),
            "right" => Some(Align::Right),
            "justify" => Some(Align::Justify),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }
}

/// Typed reads over an [`AttributeMap`].
pub trait AttributesExt {
    fn flag(&self, key: &str) -> bool;
    fn str_value(&self, key: &str) -> Option<&str>;
    fn header(&self) -> Option<u8>;
    fn list(&self) -> Option<ListType>;
    fn indent(&self) -> usize;
    /// `Some(language)` when the line is code; the language is `None` for plain code.
    fn code_block(&self) -> Option<Option<&str>>;
    fn align(&self) -> Option<Align>;
    fn is_table_cell(&self) -> bool;
}

impl AttributesExt for AttributeMap {
    fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.is_empty() && s != "false",
            Some(_) => true,
        }
    }

    fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn header(&self) -> Option<u8> {
        let level = match self.get(HEADER)? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        (1..=6).contains(&level).then_some(level as u8)
    }

    fn list(&self) -> Option<ListType> {
        self.str_value(LIST).and_then(ListType::parse)
    }

    fn indent(&self) -> usize {
        match self.get(INDENT) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn code_block(&self) -> Option<Option<&str>> {
        match self.get(CODE_BLOCK)? {
            Value::Bool(true) => Some(None),
            Value::String(s) if s.is_empty() || s == "plain" => Some(None),
            Value::String(s) => Some(Some(s.as_str())),
            _ => None,
        }
    }

    fn align(&self) -> Option<Align> {
        self.str_value(ALIGN)
            .and_then(Align::parse)
            .filter(|a| *a != Align::Left)
    }

    fn is_table_cell(&self) -> bool {
        self.contains_key(TABLE_ROW) && self.contains_key(TABLE_COL)
    }
}
