//! Error types for format operations
//!
//! Only caller misconfiguration surfaces as an error. Malformed input never
//! does: converters skip the fragment they cannot recover and keep going.

use thiserror::Error;

/// Errors that can occur during format operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Format not found in registry
    #[error("Format '{0}' not found")]
    FormatNotFound(String),
    /// Error during parsing
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Error during serialization
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Format does not support the requested operation
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    /// A block handler with this type name is already registered
    #[error("Block handler for type '{0}' is already registered")]
    DuplicateBlockHandler(String),
    /// An option passed through the string-keyed options surface was rejected
    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidOption { key: String, value: String },
}
