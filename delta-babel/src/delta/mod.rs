//! The document model: an ordered sequence of operations.
//!
//!     Only inserts matter for conversion. An insert carries either a text string or a
//!     single-key embed object, plus an optional attribute map. `retain` and `delete`
//!     operations belong to the composition engine and are carried through untouched;
//!     every converter ignores them.
//!
//!     A document is split into lines by the newline inserts it contains (see [`line`]).
//!     Block attributes (header, list, code-block, ...) live on the `"\n"` insert that
//!     terminates a line; inline attributes live on the text and embed inserts before it.
//!
//!     Block embeds (`{"block": {"type": ..., ...}}`) own one or more nested documents.
//!     Those nested documents obey the same rules, recursively, up to
//!     [`MAX_NESTING_DEPTH`].

pub mod attrs;
pub mod line;

pub use attrs::{Align, AttributesExt, ListType};
pub use line::{split, Line};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute mapping carried by an operation. Keys are unique.
pub type AttributeMap = Map<String, Value>;

/// Nested documents deeper than this are dropped (emitters) or flattened (parsers).
pub const MAX_NESTING_DEPTH: usize = 32;

/// Embed key used by block embeds.
pub const BLOCK_EMBED: &str = "block";

static EMPTY_ATTRIBUTES: Lazy<AttributeMap> = Lazy::new(AttributeMap::new);

/// Payload of an insert operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    /// A single-key object such as `{"image": "a.png"}` or `{"block": {...}}`.
    Embed(Map<String, Value>),
}

/// A single operation of a [`Delta`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Op {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<Insert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeMap>,
}

impl Op {
    pub fn text(text: impl Into<String>, attributes: AttributeMap) -> Self {
        Op {
            insert: Some(Insert::Text(text.into())),
            attributes: non_empty(attributes),
            ..Default::default()
        }
    }

    pub fn embed(kind: &str, value: Value, attributes: AttributeMap) -> Self {
        let mut payload = Map::new();
        payload.insert(kind.to_string(), value);
        Op {
            insert: Some(Insert::Embed(payload)),
            attributes: non_empty(attributes),
            ..Default::default()
        }
    }

    /// Text payload, if this is a text insert.
    pub fn as_text(&self) -> Option<&str> {
        match &self.insert {
            Some(Insert::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// `(kind, payload)` if this is an embed insert with exactly one key.
    pub fn as_embed(&self) -> Option<(&str, &Value)> {
        match &self.insert {
            Some(Insert::Embed(map)) if map.len() == 1 => {
                map.iter().next().map(|(k, v)| (k.as_str(), v))
            }
            _ => None,
        }
    }

    /// Block payload, if this is a block embed.
    pub fn as_block(&self) -> Option<&Value> {
        match self.as_embed() {
            Some((BLOCK_EMBED, value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        self.insert.is_some()
    }

    /// Attributes of this op, empty when it has none.
    pub fn attributes(&self) -> &AttributeMap {
        self.attributes.as_ref().unwrap_or(&EMPTY_ATTRIBUTES)
    }
}

fn non_empty(attributes: AttributeMap) -> Option<AttributeMap> {
    if attributes.is_empty() {
        None
    } else {
        Some(attributes)
    }
}

/// An ordered sequence of operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    pub ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delta by pushing each op, so the result is canonical.
    pub fn from_ops(ops: impl IntoIterator<Item = Op>) -> Self {
        let mut delta = Delta::new();
        for op in ops {
            delta.push(op);
        }
        delta
    }

    /// Append an op, merging it into the previous one when both are plain text with
    /// equal attributes (or both retains / deletes). Empty inserts are dropped.
    pub fn push(&mut self, mut op: Op) {
        if op.attributes.as_ref().is_some_and(|a| a.is_empty()) {
            op.attributes = None;
        }
        if matches!(op.as_text(), Some("")) || op.retain == Some(0) || op.delete == Some(0) {
            return;
        }
        if op.insert.is_none() && op.retain.is_none() && op.delete.is_none() {
            return;
        }

        if let Some(last) = self.ops.last_mut() {
            if last.attributes == op.attributes {
                match (&mut last.insert, &op.insert) {
                    (Some(Insert::Text(prev)), Some(Insert::Text(next))) => {
                        prev.push_str(next);
                        return;
                    }
                    (None, None) => {
                        if let (Some(prev), Some(next)) = (last.retain.as_mut(), op.retain) {
                            *prev += next;
                            return;
                        }
                        if let (Some(prev), Some(next)) = (last.delete.as_mut(), op.delete) {
                            *prev += next;
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }
        self.ops.push(op);
    }

    /// Append all ops of another delta.
    pub fn extend(&mut self, other: Delta) {
        for op in other.ops {
            self.push(op);
        }
    }

    pub fn insert(self, text: impl Into<String>) -> Self {
        self.insert_with(text, AttributeMap::new())
    }

    pub fn insert_with(mut self, text: impl Into<String>, attributes: AttributeMap) -> Self {
        self.push(Op::text(text, attributes));
        self
    }

    pub fn insert_embed(self, kind: &str, value: Value) -> Self {
        self.insert_embed_with(kind, value, AttributeMap::new())
    }

    pub fn insert_embed_with(mut self, kind: &str, value: Value, attributes: AttributeMap) -> Self {
        self.push(Op::embed(kind, value, attributes));
        self
    }

    pub fn retain(mut self, length: usize) -> Self {
        self.push(Op {
            retain: Some(length),
            ..Default::default()
        });
        self
    }

    pub fn delete(mut self, length: usize) -> Self {
        self.push(Op {
            delete: Some(length),
            ..Default::default()
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Read a nested document from block data: either `{"ops": [...]}` or a bare array.
    pub fn from_value(value: &Value) -> Option<Delta> {
        let ops = match value {
            Value::Object(map) => map.get("ops")?,
            Value::Array(_) => value,
            _ => return None,
        };
        let ops: Vec<Op> = serde_json::from_value(ops.clone()).ok()?;
        Some(Delta::from_ops(ops))
    }

    /// Nested document form stored inside block data: `{"ops": [...]}`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// A document holding one empty line.
    pub fn empty_line() -> Delta {
        Delta::new().insert("\n")
    }
}

/// Build an [`AttributeMap`] from key/value pairs.
#[macro_export]
macro_rules! attrs {
    () => { $crate::delta::AttributeMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::delta::AttributeMap::new();
        $( map.insert($key.to_string(), ::serde_json::json!($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_merges_equal_text() {
        let delta = Delta::new().insert("Hello ").insert("world").insert("\n");
        assert_eq!(delta.ops.len(), 1);
        assert_eq!(delta.ops[0].as_text(), Some("Hello world\n"));
    }

    #[test]
    fn test_push_keeps_different_attributes_apart() {
        let delta = Delta::new()
            .insert_with("bold", attrs! { "bold" => true })
            .insert("\n");
        assert_eq!(delta.ops.len(), 2);
    }

    #[test]
    fn test_push_drops_empty_inserts_and_attributes() {
        let delta = Delta::new()
            .insert("")
            .insert_with("x", AttributeMap::new());
        assert_eq!(delta.ops.len(), 1);
        assert!(delta.ops[0].attributes.is_none());
    }

    #[test]
    fn test_embeds_never_merge() {
        let delta = Delta::new()
            .insert_embed("divider", json!(true))
            .insert_embed("divider", json!(true));
        assert_eq!(delta.ops.len(), 2);
        assert_eq!(delta.ops[0].as_embed(), Some(("divider", &json!(true))));
    }

    #[test]
    fn test_retain_and_delete_merge() {
        let delta = Delta::new().retain(2).retain(3).delete(1).delete(1);
        assert_eq!(delta.ops.len(), 2);
        assert_eq!(delta.ops[0].retain, Some(5));
        assert_eq!(delta.ops[1].delete, Some(2));
    }

    #[test]
    fn test_json_shape() {
        let delta = Delta::new()
            .insert_with("Hi", attrs! { "bold" => true })
            .insert_embed("image", json!("a.png"));
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({"ops": [
                {"insert": "Hi", "attributes": {"bold": true}},
                {"insert": {"image": "a.png"}}
            ]})
        );
        let back: Delta = serde_json::from_value(value).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn test_from_value_accepts_object_and_array() {
        let expected = Delta::new().insert("a\n");
        assert_eq!(
            Delta::from_value(&json!({"ops": [{"insert": "a\n"}]})),
            Some(expected.clone())
        );
        assert_eq!(
            Delta::from_value(&json!([{"insert": "a"}, {"insert": "\n"}])),
            Some(expected)
        );
        assert_eq!(Delta::from_value(&json!("nope")), None);
    }

    #[test]
    fn test_as_block() {
        let op = Op::embed(BLOCK_EMBED, json!({"type": "alert"}), AttributeMap::new());
        assert_eq!(op.as_block(), Some(&json!({"type": "alert"})));
        assert!(Op::text("x", AttributeMap::new()).as_block().is_none());
    }
}
