//! Line Model
//!
//!     Splits a flat operation sequence into logical lines. A line is the run of inserts
//!     up to and including the next `"\n"`; the newline's attributes become the line's
//!     block attributes. Text inserts are split on their internal newlines, and every
//!     split point closes the current line with the attributes of the insert it came from.
//!
//!     A trailing run without a terminator still becomes a line, with no block attributes.
//!     Nothing is ever dropped, and an empty document yields no lines.

use super::{AttributeMap, Delta, Insert, Op};

/// One logical line: inline content plus the block attributes of its terminator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    /// Inline ops (text without newlines, or embeds).
    pub ops: Vec<Op>,
    /// `None` for an unterminated trailing line.
    pub attributes: Option<AttributeMap>,
}

impl Line {
    /// Block attributes, empty when the line has none.
    pub fn block_attributes(&self) -> AttributeMap {
        self.attributes.clone().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Concatenated text of all text inserts.
    pub fn plain_text(&self) -> String {
        self.ops.iter().filter_map(Op::as_text).collect()
    }

    /// The only op of the line, if it is an embed.
    pub fn single_embed(&self) -> Option<&Op> {
        match self.ops.as_slice() {
            [op] if op.as_embed().is_some() => Some(op),
            _ => None,
        }
    }
}

/// Split a document into lines.
pub fn split(delta: &Delta) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Vec<Op> = Vec::new();

    for op in &delta.ops {
        match &op.insert {
            Some(Insert::Text(text)) => {
                let attributes = op.attributes().clone();
                let mut pieces = text.split('\n').peekable();
                while let Some(piece) = pieces.next() {
                    if !piece.is_empty() {
                        current.push(Op::text(piece, attributes.clone()));
                    }
                    if pieces.peek().is_some() {
                        lines.push(Line {
                            ops: std::mem::take(&mut current),
                            attributes: Some(attributes.clone()),
                        });
                    }
                }
            }
            Some(Insert::Embed(_)) => current.push(op.clone()),
            None => {}
        }
    }

    if !current.is_empty() {
        lines.push(Line {
            ops: current,
            attributes: None,
        });
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use serde_json::json;

    #[test]
    fn test_split_basic_lines() {
        let delta = Delta::new()
            .insert("Title")
            .insert_with("\n", attrs! { "header" => 1 })
            .insert("Body\n");
        let lines = split(&delta);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].plain_text(), "Title");
        assert_eq!(lines[0].block_attributes(), attrs! { "header" => 1 });
        assert_eq!(lines[1].plain_text(), "Body");
        assert_eq!(lines[1].attributes, Some(AttributeMap::new()));
    }

    #[test]
    fn test_internal_newlines_take_origin_attributes() {
        let delta = Delta::new().insert_with("a\nb\n", attrs! { "blockquote" => true });
        let lines = split(&delta);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.block_attributes(), attrs! { "blockquote" => true });
        }
        assert_eq!(lines[1].ops[0].attributes(), &attrs! { "blockquote" => true });
    }

    #[test]
    fn test_trailing_partial_line_has_no_attributes() {
        let lines = split(&Delta::new().insert("a\nrest"));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].plain_text(), "rest");
        assert!(lines[1].attributes.is_none());
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let lines = split(&Delta::new().insert("\n\n"));
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(Line::is_empty));
    }

    #[test]
    fn test_empty_document_has_no_lines() {
        assert!(split(&Delta::new()).is_empty());
        assert!(split(&Delta::new().retain(3)).is_empty());
    }

    #[test]
    fn test_embeds_join_the_current_line() {
        let delta = Delta::new()
            .insert("see ")
            .insert_embed("image", json!("a.png"))
            .insert("\n");
        let lines = split(&delta);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].ops.len(), 2);
        assert!(lines[0].single_embed().is_none());
    }
}
