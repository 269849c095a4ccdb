use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::config::{ParseMode, ParserConfig};
use crate::construct::Genealogy;
use crate::error::Result;
use crate::records;
use crate::tokenizer::BlockTokenizer;
use crate::validation::{Validated, ValidationContext};

/// Turns GW source text into a [`Genealogy`].
///
/// Each call uses a fresh [`ValidationContext`]; a parser holds nothing but
/// its configuration and can be shared freely between threads.
#[derive(Debug, Clone, Default)]
pub struct GwParser {
    config: ParserConfig,
}

impl GwParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }
    pub fn strict() -> Self {
        Self::new(ParserConfig::strict())
    }
    pub fn lenient() -> Self {
        Self::new(ParserConfig::lenient())
    }
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }
    pub fn mode(&self) -> ParseMode {
        self.config.mode()
    }

    pub fn parse(&self, source: &str) -> Result<Validated<Genealogy>> {
        self.parse_into(source, Genealogy::new())
    }

    /// Same as [`GwParser::parse`], recording `name` as the source file.
    pub fn parse_named(&self, name: &str, source: &str) -> Result<Validated<Genealogy>> {
        let mut genealogy = Genealogy::new();
        genealogy.metadata.source_file = Some(name.to_string());
        self.parse_into(source, genealogy)
    }

    /// Parses into an existing aggregate. Records naming persons or families
    /// already present extend them instead of creating new ones.
    ///
    /// The returned findings hold every structural warning (lenient mode), the
    /// per-entity rule findings and, when enabled, the whole-graph check. In
    /// strict mode the first structural problem is returned as the error.
    pub fn parse_into(&self, source: &str, mut genealogy: Genealogy) -> Result<Validated<Genealogy>> {
        let started = Instant::now();
        let mut ctx = ValidationContext::new(self.config.mode());
        if genealogy.person_count() == 0 && genealogy.family_count() == 0 {
            genealogy.metadata.encoding = self.config.metadata.default_encoding.clone();
        }

        let tokenizer = BlockTokenizer::new(source);
        let spans = tokenizer.tokenize(&mut ctx)?;
        for span in &spans {
            records::dispatch(span, &mut genealogy, &mut ctx)?;
        }

        // forward references are legal, so the graph is checked only once everything is in
        genealogy.sync_cross_references();
        ctx.extend(genealogy.revalidate());
        if self.config.parser.consistency_check {
            ctx.extend(genealogy.validate_consistency());
        }
        genealogy.metadata.modified = Utc::now();

        info!(
            lines = tokenizer.line_count(),
            records = spans.len(),
            persons = genealogy.person_count(),
            families = genealogy.family_count(),
            errors = ctx.error_count(),
            warnings = ctx.warning_count(),
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "parse complete"
        );
        Ok(Validated::new(genealogy, ctx.into_findings()))
    }
}
