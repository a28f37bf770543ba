//! Document-level transforms
//!
//! Converters normalize block data as they read it. [`normalize_delta`] applies the same
//! pass to a document that came from elsewhere (an editor, a JSON file), so the result
//! compares equal to what a parse would have produced.

use crate::attributes::AttributeRegistry;
use crate::blocks::BlockRegistry;
use crate::delta::{Delta, Insert, BLOCK_EMBED};
use serde_json::Value;

/// Canonicalize a document: merge adjacent text runs, normalize every block embed
/// through its handler (nested documents included) and, when `attributes` is given,
/// drop or normalize attributes through the attribute registry.
///
/// Blocks that do not resolve (unknown type, failed validation, nested too deeply)
/// are kept unchanged.
pub fn normalize_delta(
    delta: &Delta,
    blocks: &BlockRegistry,
    attributes: Option<&AttributeRegistry>,
) -> Delta {
    normalize_at(delta, blocks, attributes, 0)
}

fn normalize_at(
    delta: &Delta,
    blocks: &BlockRegistry,
    attributes: Option<&AttributeRegistry>,
    depth: usize,
) -> Delta {
    let mut out = Delta::new();
    for op in &delta.ops {
        let mut op = op.clone();
        if let Some(registry) = attributes {
            op.attributes = op
                .attributes
                .as_ref()
                .map(|attrs| registry.sanitize(attrs))
                .filter(|attrs| !attrs.is_empty());
        }
        let block = op
            .as_block()
            .and_then(|data| normalize_block(data, blocks, attributes, depth + 1));
        if let Some(block) = block {
            let mut payload = serde_json::Map::new();
            payload.insert(BLOCK_EMBED.to_string(), block);
            op.insert = Some(Insert::Embed(payload));
        }
        out.push(op);
    }
    out
}

fn normalize_block(
    data: &Value,
    blocks: &BlockRegistry,
    attributes: Option<&AttributeRegistry>,
    depth: usize,
) -> Option<Value> {
    let handler = blocks.resolve(data, depth)?;
    let data = handler.normalize(data.clone());
    let nested = handler
        .nested_deltas(&data)
        .iter()
        .map(|delta| normalize_at(delta, blocks, attributes, depth))
        .collect();
    Some(handler.set_nested_deltas(data, nested))
}

/// Drop format-only operations (`retain`, `delete`), keeping the inserts.
pub fn inserts_only(delta: &Delta) -> Delta {
    Delta::from_ops(delta.ops.iter().filter(|op| op.is_insert()).cloned())
}
