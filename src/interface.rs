//! Threaded interface for running independent parses side by side.
//!
//! Each submitted source is parsed on its own thread with its own
//! [`Genealogy`] and [`crate::validation::ValidationContext`]; nothing is
//! shared between workers except the immutable configuration. There is no
//! cancellation: a parse runs to completion or fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::construct::Genealogy;
use crate::error::{GwError, Result};
use crate::parser::GwParser;
use crate::validation::Validated;

pub type ParseOutcome = Result<Validated<Genealogy>>;

/// Opaque parse identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParseId(u64);

impl ParseId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Handle to a running or completed parse.
pub struct ParseHandle {
    pub id: ParseId,
    pub name: String,
    started: Instant,
    join: Option<JoinHandle<ParseOutcome>>,
}

impl ParseHandle {
    /// Wait for the parse to finish and take its outcome.
    pub fn join(mut self) -> ParseOutcome {
        let handle = self
            .join
            .take()
            .ok_or_else(|| GwError::Invariant(format!("parse {} already joined", self.id.0)))?;
        handle.join().map_err(|_| {
            warn!(parse = self.id.0, name = %self.name, "parse worker panicked");
            GwError::Worker(format!("parse `{}` panicked", self.name))
        })?
    }
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Hands out parse ids and spawns one worker per source.
pub struct ParseInterface {
    parser: GwParser,
    next_id: AtomicU64,
}

impl ParseInterface {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            parser: GwParser::new(config),
            next_id: AtomicU64::new(0),
        }
    }

    fn allocate_id(&self) -> ParseId {
        ParseId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Parse `source` on a background thread.
    pub fn start_parse(&self, name: impl Into<String>, source: String) -> Result<ParseHandle> {
        let id = self.allocate_id();
        let name = name.into();
        let parser = self.parser.clone();
        let worker_name = name.clone();
        let join = std::thread::Builder::new()
            .name(format!("gwgraph-parse-{}", id.0))
            .spawn(move || parser.parse_named(&worker_name, &source))
            .map_err(|e| GwError::Worker(e.to_string()))?;
        debug!(parse = id.0, %name, "parse started");
        Ok(ParseHandle {
            id,
            name,
            started: Instant::now(),
            join: Some(join),
        })
    }

    /// Parse on the current thread.
    pub fn run_sync(&self, name: &str, source: &str) -> ParseOutcome {
        self.parser.parse_named(name, source)
    }

    /// Starts every source, then joins them in submission order. Sources whose
    /// worker could not be spawned are reported first.
    pub fn parse_all<I>(&self, sources: I) -> Vec<(String, ParseOutcome)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut handles = Vec::new();
        let mut outcomes = Vec::new();
        for (name, source) in sources {
            match self.start_parse(name.clone(), source) {
                Ok(handle) => handles.push(handle),
                Err(e) => outcomes.push((name, Err(e))),
            }
        }
        for handle in handles {
            let name = handle.name.clone();
            outcomes.push((name, handle.join()));
        }
        outcomes
    }
}

impl Default for ParseInterface {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
