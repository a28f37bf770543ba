//! Format implementations
//!
//! Each format converts between the document model and one surface syntax.

pub mod html;
pub mod markdown;

pub use html::{HtmlFormat, HtmlOptions, HtmlParseOptions};
pub use markdown::{MarkdownFormat, MarkdownOptions, MarkdownParseOptions};
