//! Conversion between line-oriented rich-text documents, HTML and Markdown
//!
//!     The document model is a Delta: a flat list of insert operations where block
//!     formatting sits on the newline that ends each line (see [`delta`]). Four
//!     converters sit on top of it:
//!
//!         document → HTML       formats::html::serializer
//!         HTML → document       formats::html::parser
//!         document → Markdown   formats::markdown::serializer
//!         Markdown → document   formats::markdown::parser
//!
//!     This is a pure lib: nothing here reads the environment, prints, or installs a
//!     tracing subscriber.
//!
//!     The file structure :
//!     .
//!     ├── error.rs
//!     ├── format.rs               # Format trait definition
//!     ├── registry.rs             # FormatRegistry for discovery and selection
//!     ├── transforms.rs           # document-level normalization
//!     ├── delta                   # document model and line splitting
//!     ├── attributes.rs           # attribute format registry
//!     ├── blocks                  # block handler registry and standard handlers
//!     ├── common                  # inline formats, line runs, slugs
//!     └── formats
//!         ├── html
//!         └── markdown
//!
//! Testing
//!     tests
//!     ├── lib.rs
//!     ├── html
//!     └── markdown
//!
//! Failure policy
//!
//!     Malformed input never fails a conversion. An invalid block, an unknown embed, a
//!     grid that does not add up: each is skipped or flattened on the spot and reported
//!     through `tracing`. Only caller misconfiguration (an unknown format name, a
//!     duplicate block handler, an unparsable option value) is a [`FormatError`].

pub mod attributes;
pub mod blocks;
pub mod common;
pub mod delta;
pub mod error;
pub mod format;
pub mod formats;
pub mod registry;
pub mod transforms;

pub use attributes::{AttributeFormat, AttributeRegistry};
pub use blocks::{BlockHandler, BlockRegistry};
pub use delta::{split, AttributeMap, Delta, Insert, Line, Op};
pub use error::FormatError;
pub use format::Format;
pub use formats::html::{parse_from_html, serialize_to_html};
pub use formats::markdown::{parse_from_markdown, serialize_to_markdown};
pub use registry::FormatRegistry;
pub use transforms::normalize_delta;
