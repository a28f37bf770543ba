//! Shared configuration loader for delta-babel converters.
//!
//! `defaults/delta.default.toml` is embedded so that docs and runtime behavior stay in
//! sync. Applications layer user-specific files on top of those defaults via [`Loader`]
//! before deserializing into [`DeltaConfig`], then convert the sections into the
//! converter option structs.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use delta_babel::formats::html::{HtmlOptions, HtmlParseOptions, WidthUnit};
use delta_babel::formats::markdown::{DiagramMode, MarkdownOptions, MarkdownParseOptions, MathMode};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/delta.default.toml");

/// Top-level configuration consumed by delta-babel applications.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaConfig {
    pub html: HtmlConfig,
    pub markdown: MarkdownConfig,
    pub parse: ParseConfig,
}

impl DeltaConfig {
    /// Markdown serializer options. Its embedded HTML uses the `[html]` section.
    pub fn markdown_options(&self) -> MarkdownOptions {
        MarkdownOptions::from(&self.markdown).with_html(HtmlOptions::from(&self.html))
    }

    pub fn html_parse_options(&self) -> HtmlParseOptions {
        HtmlParseOptions::from(&self.parse)
    }

    pub fn markdown_parse_options(&self) -> MarkdownParseOptions {
        MarkdownParseOptions::from(&self.parse)
    }
}

/// Mirrors [`HtmlOptions`].
#[derive(Debug, Clone, Deserialize)]
pub struct HtmlConfig {
    pub pretty: bool,
    pub wrapper: String,
    pub anchor_links: bool,
    pub hierarchical_numbering: bool,
    pub table_width: TableWidth,
    pub sanitize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TableWidth {
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "pixel")]
    Pixel,
}

impl From<TableWidth> for WidthUnit {
    fn from(width: TableWidth) -> Self {
        match width {
            TableWidth::Percent => WidthUnit::Percent,
            TableWidth::Pixel => WidthUnit::Pixel,
        }
    }
}

impl From<&HtmlConfig> for HtmlOptions {
    fn from(config: &HtmlConfig) -> Self {
        HtmlOptions {
            pretty: config.pretty,
            wrapper: Some(config.wrapper.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
            anchor_links: config.anchor_links,
            hierarchical_numbering: config.hierarchical_numbering,
            table_width: config.table_width.into(),
            sanitize: config.sanitize,
        }
    }
}

/// Markdown serializer knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownConfig {
    pub preserve_empty_lines: bool,
    pub math: Math,
    pub diagram: Diagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Math {
    #[serde(rename = "dollar")]
    Dollar,
    #[serde(rename = "html")]
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Diagram {
    #[serde(rename = "fenced")]
    Fenced,
    #[serde(rename = "embed")]
    Embed,
}

impl From<Math> for MathMode {
    fn from(math: Math) -> Self {
        match math {
            Math::Dollar => MathMode::Dollar,
            Math::Html => MathMode::Html,
        }
    }
}

impl From<Diagram> for DiagramMode {
    fn from(diagram: Diagram) -> Self {
        match diagram {
            Diagram::Fenced => DiagramMode::Fenced,
            Diagram::Embed => DiagramMode::Embed,
        }
    }
}

impl From<&MarkdownConfig> for MarkdownOptions {
    fn from(config: &MarkdownConfig) -> Self {
        MarkdownOptions::new()
            .with_preserve_empty_lines(config.preserve_empty_lines)
            .with_math(config.math.into())
            .with_diagram(config.diagram.into())
    }
}

/// Parser knobs, shared by the HTML and Markdown parsers.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseConfig {
    pub normalize_whitespace: bool,
    pub promote_display_math: bool,
    pub diagram: Diagram,
}

impl From<&ParseConfig> for HtmlParseOptions {
    fn from(config: &ParseConfig) -> Self {
        HtmlParseOptions::new().with_normalize_whitespace(config.normalize_whitespace)
    }
}

impl From<&ParseConfig> for MarkdownParseOptions {
    fn from(config: &ParseConfig) -> Self {
        MarkdownParseOptions::new()
            .with_promote_display_math(config.promote_display_math)
            .with_diagram(config.diagram.into())
            .with_html(config.into())
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer TOML text, e.g. a settings blob received from an editor.
    pub fn with_toml(mut self, toml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(toml, FileFormat::Toml));
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<DeltaConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<DeltaConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert!(!config.html.pretty);
        assert_eq!(config.html.table_width, TableWidth::Percent);
        assert_eq!(config.markdown.math, Math::Dollar);
        assert_eq!(config.parse.diagram, Diagram::Embed);
    }

    #[test]
    fn defaults_match_option_defaults() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(HtmlOptions::from(&config.html), HtmlOptions::default());
        assert_eq!(config.markdown_options(), MarkdownOptions::default());
        assert_eq!(config.html_parse_options(), HtmlParseOptions::default());
        assert_eq!(config.markdown_parse_options(), MarkdownParseOptions::default());
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("html.table_width", "pixel")
            .expect("override to apply")
            .set_override("markdown.math", "html")
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(HtmlOptions::from(&config.html).table_width, WidthUnit::Pixel);
        assert_eq!(config.markdown_options().math, MathMode::Html);
    }

    #[test]
    fn layers_toml_text() {
        let config = Loader::new()
            .with_toml("[html]\nwrapper = \"article\"\nanchor_links = true\n")
            .build()
            .expect("config to build");
        let options = config.markdown_options();
        assert_eq!(options.html.wrapper.as_deref(), Some("article"));
        assert!(options.html.anchor_links);
        assert!(!options.html.pretty);
    }

    #[test]
    fn rejects_unknown_enum_value() {
        let result = Loader::new()
            .set_override("markdown.diagram", "ascii")
            .expect("override to apply")
            .build();
        assert!(result.is_err());
    }
}
