//! Attribute Format Registry
//!
//!     Individual attribute values are validated, normalized and (for custom formats)
//!     rendered through a narrow contract: [`AttributeFormat`]. The converters consult the
//!     registry before their built-in handling:
//!
//!     - with `sanitize` enabled, attributes whose format rejects the value are dropped
//!       and accepted values are normalized;
//!     - inline attributes outside the built-in set are rendered by their format, if one
//!       is registered, and silently ignored otherwise;
//!     - the HTML parser asks custom formats to recognize elements it has no built-in
//!       mapping for.
//!
//!     The built-in formats only validate and normalize; rendering of built-in attributes
//!     lives in the converters.

use crate::delta::attrs::{
    ALIGN, BACKGROUND, COLOR, HEADER, INDENT, LINK, LIST, SCRIPT,
};
use crate::delta::{Align, AttributeMap, ListType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Contract for one attribute format.
pub trait AttributeFormat: Send + Sync {
    /// Attribute key handled by this format.
    fn name(&self) -> &str;

    fn validate(&self, _value: &Value) -> bool {
        true
    }

    fn normalize(&self, value: Value) -> Value {
        value
    }

    /// Wrap rendered inner HTML. `None` leaves rendering to the converter.
    fn render_html(&self, _value: &Value, _inner: &str) -> Option<String> {
        None
    }

    /// Wrap rendered inner Markdown. `None` leaves rendering to the converter.
    fn to_markdown(&self, _value: &Value, _inner: &str) -> Option<String> {
        None
    }

    /// Recognize an element as carrying this format. `attribute` looks up an attribute
    /// of the element by name.
    fn match_element(
        &self,
        _tag: &str,
        _attribute: &dyn Fn(&str) -> Option<String>,
    ) -> Option<Value> {
        None
    }
}

/// Name-keyed table of attribute formats.
pub struct AttributeRegistry {
    formats: HashMap<String, Box<dyn AttributeFormat>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        AttributeRegistry {
            formats: HashMap::new(),
        }
    }

    /// Registry with the built-in validators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(LinkFormat);
        registry.register(ColorFormat(COLOR));
        registry.register(ColorFormat(BACKGROUND));
        registry.register(HeaderFormat);
        registry.register(ListFormat);
        registry.register(AlignFormat);
        registry.register(ScriptFormat);
        registry.register(IndentFormat);
        registry
    }

    /// Register a format, replacing any previous format with the same name.
    pub fn register<F: AttributeFormat + 'static>(&mut self, format: F) {
        self.formats
            .insert(format.name().to_string(), Box::new(format));
    }

    pub fn get(&self, name: &str) -> Option<&dyn AttributeFormat> {
        self.formats.get(name).map(|f| f.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// All registered names (sorted)
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<_> = self.formats.keys().cloned().collect();
        names.sort();
        names
    }

    /// Formats sorted by name, for deterministic element matching.
    pub fn formats(&self) -> Vec<&dyn AttributeFormat> {
        let mut formats: Vec<_> = self.formats.values().map(|f| f.as_ref()).collect();
        formats.sort_by(|a, b| a.name().cmp(b.name()));
        formats
    }

    /// Drop attributes whose registered format rejects them and normalize the rest.
    /// Attributes without a registered format pass through.
    pub fn sanitize(&self, attributes: &AttributeMap) -> AttributeMap {
        let mut out = AttributeMap::new();
        for (key, value) in attributes {
            match self.get(key) {
                Some(format) if !format.validate(value) => {
                    tracing::debug!(attribute = %key, "dropping attribute rejected by its format");
                }
                Some(format) => {
                    out.insert(key.clone(), format.normalize(value.clone()));
                }
                None => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `link`: relative URLs and a fixed set of schemes.
pub struct LinkFormat;

const SAFE_SCHEMES: [&str; 6] = ["http", "https", "mailto", "tel", "ftp", "ftps"];

impl AttributeFormat for LinkFormat {
    fn name(&self) -> &str {
        LINK
    }

    fn validate(&self, value: &Value) -> bool {
        let Some(href) = value.as_str() else {
            return false;
        };
        match url::Url::parse(href.trim()) {
            Ok(url) => SAFE_SCHEMES.contains(&url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => true,
            Err(_) => false,
        }
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        }
    }
}

static COLOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^(
            \#[0-9a-f]{3,4} | \#[0-9a-f]{6} | \#[0-9a-f]{8}
          | (rgb|rgba|hsl|hsla)\(\s*[0-9.%]+\s*(,\s*[0-9.%]+\s*){2,3}\)
          | [a-z]+
        )$",
    )
    .expect("color pattern is valid")
});

/// `color` / `background`: hex, rgb(a), hsl(a) or a named color.
pub struct ColorFormat(pub &'static str);

impl AttributeFormat for ColorFormat {
    fn name(&self) -> &str {
        self.0
    }

    fn validate(&self, value: &Value) -> bool {
        value
            .as_str()
            .is_some_and(|c| COLOR_PATTERN.is_match(c.trim()))
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_ascii_lowercase()),
            other => other,
        }
    }
}

/// `header`: levels 1 to 6.
pub struct HeaderFormat;

impl AttributeFormat for HeaderFormat {
    fn name(&self) -> &str {
        HEADER
    }

    fn validate(&self, value: &Value) -> bool {
        let mut probe = AttributeMap::new();
        probe.insert(HEADER.to_string(), value.clone());
        crate::delta::AttributesExt::header(&probe).is_some()
    }

    fn normalize(&self, value: Value) -> Value {
        match &value {
            Value::String(s) => s.parse::<u64>().map(Value::from).unwrap_or(value),
            _ => value,
        }
    }
}

/// `list`: ordered, bullet, checked, unchecked.
pub struct ListFormat;

impl AttributeFormat for ListFormat {
    fn name(&self) -> &str {
        LIST
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_str().and_then(ListType::parse).is_some()
    }
}

/// `align`: left, center, right, justify.
pub struct AlignFormat;

impl AttributeFormat for AlignFormat {
    fn name(&self) -> &str {
        ALIGN
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_str().and_then(Align::parse).is_some()
    }
}

/// `script`: sub or super.
pub struct ScriptFormat;

impl AttributeFormat for ScriptFormat {
    fn name(&self) -> &str {
        SCRIPT
    }

    fn validate(&self, value: &Value) -> bool {
        value
            .as_str()
            .and_then(crate::common::inline::Script::parse)
            .is_some()
    }
}

/// `indent`: 1 to 8.
pub struct IndentFormat;

impl AttributeFormat for IndentFormat {
    fn name(&self) -> &str {
        INDENT
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_u64().is_some_and(|n| (1..=8).contains(&n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use serde_json::json;

    struct HighlightFormat;
    impl AttributeFormat for HighlightFormat {
        fn name(&self) -> &str {
            "highlight"
        }
        fn render_html(&self, value: &Value, inner: &str) -> Option<String> {
            Some(format!(
                "<span class=\"hl-{}\">{inner}</span>",
                value.as_str()?
            ))
        }
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = AttributeRegistry::with_defaults();
        assert!(registry.has("link"));
        assert!(registry.has("color"));
        assert!(!registry.has("bold"));
    }

    #[test]
    fn test_link_validation() {
        let link = LinkFormat;
        assert!(link.validate(&json!("https://example.com")));
        assert!(link.validate(&json!("/relative/path")));
        assert!(link.validate(&json!("#anchor")));
        assert!(link.validate(&json!("mailto:a@b.c")));
        assert!(!link.validate(&json!("javascript:alert(1)")));
        assert!(!link.validate(&json!(42)));
    }

    #[test]
    fn test_color_validation() {
        let color = ColorFormat(COLOR);
        assert!(color.validate(&json!("#ff0000")));
        assert!(color.validate(&json!("rgb(1, 2, 3)")));
        assert!(color.validate(&json!("Red")));
        assert!(!color.validate(&json!("red; position: fixed")));
        assert_eq!(color.normalize(json!(" Red ")), json!("red"));
    }

    #[test]
    fn test_sanitize_drops_invalid_and_keeps_unknown() {
        let registry = AttributeRegistry::with_defaults();
        let attributes = attrs! {
            "link" => "javascript:void(0)",
            "color" => "#ABC",
            "bold" => true,
            "header" => "2",
        };
        let clean = registry.sanitize(&attributes);
        assert!(!clean.contains_key("link"));
        assert_eq!(clean.get("color"), Some(&json!("#abc")));
        assert_eq!(clean.get("bold"), Some(&json!(true)));
        assert_eq!(clean.get("header"), Some(&json!(2)));
    }

    #[test]
    fn test_custom_format_renders() {
        let mut registry = AttributeRegistry::new();
        registry.register(HighlightFormat);
        let format = registry.get("highlight").unwrap();
        assert_eq!(
            format.render_html(&json!("blue"), "x").as_deref(),
            Some("<span class=\"hl-blue\">x</span>")
        );
        assert_eq!(registry.list_formats(), vec!["highlight"]);
    }
}
