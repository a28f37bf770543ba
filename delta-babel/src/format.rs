//! Format trait definition
//!
//! This module defines the core Format trait that all format implementations must implement.
//! The trait provides a uniform interface for parsing and serializing documents.

use crate::delta::Delta;
use crate::error::FormatError;
use std::collections::HashMap;

/// Trait for document formats
///
/// Implementors provide bidirectional conversion between a surface syntax and the
/// document model. Formats can support parsing, serialization, or both.
///
/// # Examples
///
/// ```ignore
/// struct PlainText;
///
/// impl Format for PlainText {
///     fn name(&self) -> &str {
///         "text"
///     }
///
///     fn supports_serialization(&self) -> bool {
///         true
///     }
///
///     fn serialize(&self, delta: &Delta) -> Result<String, FormatError> {
///         Ok(split(delta).iter().map(Line::plain_text).collect::<Vec<_>>().join("\n"))
///     }
/// }
/// ```
pub trait Format: Send + Sync {
    /// The name of this format (e.g., "markdown", "html")
    fn name(&self) -> &str;

    /// Optional description of this format
    fn description(&self) -> &str {
        ""
    }

    /// File extensions associated with this format (e.g., ["md", "markdown"])
    ///
    /// Returns a slice of file extensions without the leading dot.
    /// Used for automatic format detection from filenames.
    fn file_extensions(&self) -> &[&str] {
        &[]
    }

    /// Whether this format supports parsing (source → document)
    fn supports_parsing(&self) -> bool {
        false
    }

    /// Whether this format supports serialization (document → source)
    fn supports_serialization(&self) -> bool {
        false
    }

    /// Parse source text into a document
    ///
    /// Default implementation returns NotSupported error.
    fn parse(&self, _source: &str) -> Result<Delta, FormatError> {
        Err(FormatError::NotSupported(format!(
            "Format '{}' does not support parsing",
            self.name()
        )))
    }

    /// Serialize a document into source text
    ///
    /// Default implementation returns NotSupported error.
    fn serialize(&self, _delta: &Delta) -> Result<String, FormatError> {
        Err(FormatError::NotSupported(format!(
            "Format '{}' does not support serialization",
            self.name()
        )))
    }

    /// Serialize a document with string-keyed options layered over the format's own
    /// options. Unknown keys and unparsable values are [`FormatError::InvalidOption`].
    fn serialize_with_options(
        &self,
        delta: &Delta,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        if options.is_empty() {
            self.serialize(delta)
        } else {
            Err(FormatError::NotSupported(format!(
                "Format '{}' does not support extra parameters",
                self.name()
            )))
        }
    }
}

/// Parse a boolean option value (`true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`).
pub(crate) fn bool_option(key: &str, value: &str) -> Result<bool, FormatError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid_option(key, value)),
    }
}

pub(crate) fn invalid_option(key: &str, value: &str) -> FormatError {
    FormatError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ParseOnly;
    impl Format for ParseOnly {
        fn name(&self) -> &str {
            "parse-only"
        }
        fn supports_parsing(&self) -> bool {
            true
        }
        fn parse(&self, source: &str) -> Result<Delta, FormatError> {
            Ok(Delta::new().insert(format!("{source}\n")))
        }
    }

    #[test]
    fn test_default_serialize_is_not_supported() {
        let err = ParseOnly.serialize(&Delta::new()).unwrap_err();
        assert_eq!(
            err,
            FormatError::NotSupported("Format 'parse-only' does not support serialization".to_string())
        );
    }

    #[test]
    fn test_default_serialize_with_options_rejects_parameters() {
        let mut options = HashMap::new();
        options.insert("pretty".to_string(), "true".to_string());
        assert!(matches!(
            ParseOnly.serialize_with_options(&Delta::new(), &options),
            Err(FormatError::NotSupported(_))
        ));
    }

    #[test]
    fn test_bool_option() {
        assert_eq!(bool_option("pretty", "Yes"), Ok(true));
        assert_eq!(bool_option("pretty", "0"), Ok(false));
        assert_eq!(
            bool_option("pretty", "maybe"),
            Err(invalid_option("pretty", "maybe"))
        );
    }
}
