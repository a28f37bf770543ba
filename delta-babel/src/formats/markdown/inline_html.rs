//! Inline HTML inside Markdown paragraphs.
//!
//!     comrak hands every inline tag over as a separate raw string, so `<u>x</u>`
//!     arrives as an opening tag, a text node and a closing tag. [`classify`] recognizes
//!     the tags that carry document attributes; [`TagStack`] tracks which attributes each
//!     open tag added so its closing tag restores exactly what it changed.

use crate::common::inline::{attribute_for_tag, color_attributes, parse_style};
use crate::delta::attrs::{ALT, COLOR, FLOAT, HEIGHT, WIDTH};
use crate::delta::AttributeMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9]*)((?:\s[^>]*?)?)\s*/?>$").expect("valid open tag regex")
});
static CLOSE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</([A-Za-z][A-Za-z0-9]*)\s*>$").expect("valid close tag regex"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid attribute regex")
});

/// An inline HTML fragment that affects the document.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineTag {
    /// An opening tag and the attributes it switches on.
    Open {
        tag: String,
        attributes: Vec<(String, Value)>,
    },
    Close(String),
    Break,
    Image {
        src: String,
        attributes: AttributeMap,
    },
    /// `<span data-formula="…">`. Its text content repeats the formula.
    Formula(String),
}

/// Recognize one raw inline HTML fragment. Fragments without a document meaning
/// (comments, unknown tags) are `None`.
pub fn classify(html: &str) -> Option<InlineTag> {
    let html = html.trim();
    if let Some(caps) = CLOSE_TAG.captures(html) {
        return Some(InlineTag::Close(caps[1].to_ascii_lowercase()));
    }
    let caps = OPEN_TAG.captures(html)?;
    let tag = caps[1].to_ascii_lowercase();
    let attrs = parse_attributes(caps.get(2).map_or("", |m| m.as_str()));
    let attr = |name: &str| {
        attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    match tag.as_str() {
        "br" => Some(InlineTag::Break),
        "img" => {
            let src = attr("src")?;
            let mut attributes = AttributeMap::new();
            if let Some(alt) = attr("alt").filter(|alt| !alt.is_empty()) {
                attributes.insert(ALT.to_string(), Value::from(alt));
            }
            for key in [WIDTH, HEIGHT] {
                if let Some(value) = attr(key) {
                    let value = value
                        .parse::<u64>()
                        .map(Value::from)
                        .unwrap_or(Value::String(value));
                    attributes.insert(key.to_string(), value);
                }
            }
            let float = attr("style").and_then(|style| {
                parse_style(&style)
                    .into_iter()
                    .find(|(prop, _)| prop == "float")
                    .map(|(_, value)| value)
            });
            if let Some(float) = float.filter(|f| f != "none") {
                attributes.insert(FLOAT.to_string(), Value::from(float));
            }
            Some(InlineTag::Image { src, attributes })
        }
        "span" if attr("data-formula").is_some() => attr("data-formula").map(InlineTag::Formula),
        "span" | "font" => {
            let mut attributes: Vec<(String, Value)> = attr("style")
                .map(|style| {
                    color_attributes(&style)
                        .into_iter()
                        .map(|(key, value)| (key.to_string(), Value::from(value)))
                        .collect()
                })
                .unwrap_or_default();
            if let Some(color) = attr("color").filter(|_| tag == "font") {
                attributes.push((COLOR.to_string(), Value::from(color)));
            }
            Some(InlineTag::Open {
                tag: tag.clone(),
                attributes,
            })
        }
        _ => {
            let (key, value) = attribute_for_tag(&tag)?;
            Some(InlineTag::Open {
                tag: tag.clone(),
                attributes: vec![(key.to_string(), value)],
            })
        }
    }
}

fn parse_attributes(source: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(source)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (
                caps[1].to_ascii_lowercase(),
                html_escape::decode_html_entities(value).into_owned(),
            )
        })
        .collect()
}

struct OpenTag {
    tag: String,
    /// Previous value of every key the tag set (`None` when the key was absent).
    saved: Vec<(String, Option<Value>)>,
    /// Text inside the tag is dropped.
    suppress: bool,
}

/// The inline attributes in effect plus the open tags that changed them.
pub struct TagStack {
    current: AttributeMap,
    open: Vec<OpenTag>,
}

impl TagStack {
    pub fn new(base: &AttributeMap) -> Self {
        TagStack {
            current: base.clone(),
            open: Vec::new(),
        }
    }

    pub fn current(&self) -> &AttributeMap {
        &self.current
    }

    /// Whether content is currently swallowed by an open tag.
    pub fn suppressed(&self) -> bool {
        self.open.iter().any(|tag| tag.suppress)
    }

    pub fn open(&mut self, tag: String, attributes: Vec<(String, Value)>) {
        let saved = attributes
            .into_iter()
            .map(|(key, value)| {
                let previous = self.current.insert(key.clone(), value);
                (key, previous)
            })
            .collect();
        self.open.push(OpenTag {
            tag,
            saved,
            suppress: false,
        });
    }

    /// Open a tag whose text content must not reach the document.
    pub fn open_suppressed(&mut self, tag: String) {
        self.open.push(OpenTag {
            tag,
            saved: Vec::new(),
            suppress: true,
        });
    }

    /// Close the innermost open tag named `tag`, and every tag opened after it. A
    /// closing tag without a matching opening tag is ignored.
    pub fn close(&mut self, tag: &str) {
        let Some(index) = self.open.iter().rposition(|open| open.tag == tag) else {
            return;
        };
        while self.open.len() > index {
            let Some(open) = self.open.pop() else {
                break;
            };
            for (key, previous) in open.saved.into_iter().rev() {
                match previous {
                    Some(value) => self.current.insert(key, value),
                    None => self.current.remove(&key),
                };
            }
        }
    }
}
