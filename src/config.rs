//! Parser configuration.
//!
//! `defaults/gwgraph.default.toml` is embedded into the crate. A [`Loader`]
//! layers user files, `GWGRAPH_*` environment variables and explicit
//! overrides on top of it before deserializing into [`ParserConfig`].

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, ValueKind};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_TOML: &str = include_str!("../defaults/gwgraph.default.toml");

/// How structural problems in the source text are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Abort on the first structural error.
    Strict,
    /// Drop the offending line, record a warning and continue.
    #[default]
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub parser: ParserSettings,
    pub metadata: MetadataSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserSettings {
    pub mode: ParseMode,
    pub consistency_check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSettings {
    pub default_encoding: String,
}

impl ParserConfig {
    pub fn strict() -> Self {
        Self::default().with_mode(ParseMode::Strict)
    }
    pub fn lenient() -> Self {
        Self::default().with_mode(ParseMode::Lenient)
    }
    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.parser.mode = mode;
        self
    }
    pub fn mode(&self) -> ParseMode {
        self.parser.mode
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            parser: ParserSettings {
                mode: ParseMode::Lenient,
                consistency_check: true,
            },
            metadata: MetadataSettings {
                default_encoding: String::from("utf-8"),
            },
        }
    }
}

/// Builds a [`ParserConfig`] from the embedded defaults plus whatever the
/// caller stacks on top. Later layers win.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    fn add_toml(mut self, path: &Path, required: bool) -> Self {
        let source = File::from(path).format(FileFormat::Toml).required(required);
        self.builder = self.builder.add_source(source);
        self
    }

    /// A TOML file that has to exist; [`Loader::build`] fails otherwise.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.add_toml(path.as_ref(), true)
    }

    /// A TOML file that is read only when present.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.add_toml(path.as_ref(), false)
    }

    /// `GWGRAPH_PARSER__MODE=strict` and friends.
    pub fn with_environment(mut self) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix("GWGRAPH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// A single dotted key, e.g. `parser.mode`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<ParserConfig> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_defaults() -> Result<ParserConfig> {
    Loader::new().build()
}
