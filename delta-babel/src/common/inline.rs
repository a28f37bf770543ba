//! Inline format tables shared by the HTML and Markdown converters.
//!
//!     Tag-based inline formats are a closed set, nested in one declared order: the first
//!     format in [`DECLARED_ORDER`] is always the outermost wrapper. Color and background
//!     are not tags; they render as one style span inside all tag wrappers, and a link is
//!     always the outermost wrapper. Attributes outside this set are open-ended and go
//!     through the attribute registry (see `crate::attributes`).

use crate::delta::attrs::{
    BACKGROUND, BOLD, CODE, COLOR, ITALIC, KBD, MARK, SCRIPT, STRIKE, UNDERLINE,
};
use crate::delta::{AttributeMap, AttributesExt};
use serde_json::Value;

/// Tag-based inline formats, outermost first.
pub const DECLARED_ORDER: [InlineFormat; 8] = [
    InlineFormat::Bold,
    InlineFormat::Italic,
    InlineFormat::Underline,
    InlineFormat::Strike,
    InlineFormat::Code,
    InlineFormat::Script,
    InlineFormat::Mark,
    InlineFormat::Kbd,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineFormat {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Script,
    Mark,
    Kbd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Sub,
    Super,
}

impl Script {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sub" => Some(Script::Sub),
            "super" => Some(Script::Super),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Script::Sub => "sub",
            Script::Super => "sup",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Script::Sub => "sub",
            Script::Super => "super",
        }
    }
}

impl InlineFormat {
    pub fn key(&self) -> &'static str {
        match self {
            InlineFormat::Bold => BOLD,
            InlineFormat::Italic => ITALIC,
            InlineFormat::Underline => UNDERLINE,
            InlineFormat::Strike => STRIKE,
            InlineFormat::Code => CODE,
            InlineFormat::Script => SCRIPT,
            InlineFormat::Mark => MARK,
            InlineFormat::Kbd => KBD,
        }
    }

    /// HTML tag for this format given its attribute value. `None` when the value does
    /// not switch the format on.
    pub fn html_tag(&self, attrs: &AttributeMap) -> Option<&'static str> {
        let tag = match self {
            InlineFormat::Bold => "strong",
            InlineFormat::Italic => "em",
            InlineFormat::Underline => "u",
            InlineFormat::Strike => "s",
            InlineFormat::Code => "code",
            InlineFormat::Mark => "mark",
            InlineFormat::Kbd => "kbd",
            InlineFormat::Script => {
                return attrs
                    .str_value(SCRIPT)
                    .and_then(Script::parse)
                    .map(|s| s.tag())
            }
        };
        attrs.flag(self.key()).then_some(tag)
    }

    /// Whether `key` is one of the built-in inline attributes.
    pub fn is_builtin_key(key: &str) -> bool {
        DECLARED_ORDER.iter().any(|f| f.key() == key)
            || key == COLOR
            || key == BACKGROUND
            || key == crate::delta::attrs::LINK
    }
}

/// Attribute set by an inline HTML tag, for tags that carry no parameters.
pub fn attribute_for_tag(tag: &str) -> Option<(&'static str, Value)> {
    let entry = match tag {
        "strong" | "b" => (BOLD, Value::Bool(true)),
        "em" | "i" => (ITALIC, Value::Bool(true)),
        "u" | "ins" => (UNDERLINE, Value::Bool(true)),
        "s" | "strike" | "del" => (STRIKE, Value::Bool(true)),
        "code" => (CODE, Value::Bool(true)),
        "sub" => (SCRIPT, Value::from(Script::Sub.as_str())),
        "sup" => (SCRIPT, Value::from(Script::Super.as_str())),
        "mark" => (MARK, Value::Bool(true)),
        "kbd" => (KBD, Value::Bool(true)),
        _ => return None,
    };
    Some(entry)
}

/// Split an inline `style` attribute into `(property, value)` pairs, lowercased
/// property names, trimmed values.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

/// Color and background attributes carried by a `style` attribute.
pub fn color_attributes(style: &str) -> Vec<(&'static str, String)> {
    parse_style(style)
        .into_iter()
        .filter_map(|(prop, value)| match prop.as_str() {
            "color" => Some((COLOR, value)),
            "background-color" | "background" => Some((BACKGROUND, value)),
            _ => None,
        })
        .collect()
}

/// `style` attribute value for color/background, `None` when neither is set.
pub fn color_style(attrs: &AttributeMap) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(color) = attrs.str_value(COLOR) {
        parts.push(format!("color: {color}"));
    }
    if let Some(background) = attrs.str_value(BACKGROUND) {
        parts.push(format!("background-color: {background}"));
    }
    (!parts.is_empty()).then(|| parts.join("; "))
}
