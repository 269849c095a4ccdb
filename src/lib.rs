//! gwgraph – a fault-tolerant reader for GeneWeb (GW) flat-text genealogies.
//!
//! A GW source is a sequence of records:
//! * `fam` – a couple, its marriage and an optional `beg ... end` child list.
//! * `pevt` / `fevt` – personal and family event blocks (the gwplus dialect).
//! * `notes`, `rel`, `notes-db`, `page-ext`, `wizard-note` – free text and
//!   non-biological relations.
//!
//! Parsing produces a [`construct::Genealogy`]: persons keyed by
//! `SURNAME_Given_occurrence`, families keyed by `FAM_001`-style identifiers,
//! with every spouse and child linked back to the families naming them.
//!
//! ## Modules
//! * [`tokenizer`] – Groups source lines into classified record spans.
//! * [`records`] – One parser per record kind.
//! * [`date`] – The date micro-language (qualifiers, calendars, ranges, text dates).
//! * [`entity`] – Persons, families, children and typed events.
//! * [`construct`] – The aggregate, its identity resolver and indexes.
//! * [`validation`] – Findings, the per-parse accumulator and consistency rules.
//! * [`parser`] – The [`parser::GwParser`] tying the above together.
//! * [`config`] – Layered configuration (embedded defaults, files, environment).
//! * [`interface`] – Runs independent parses on worker threads.
//!
//! ## Errors and findings
//! Problems come in two flavours. Structural problems (unknown keywords,
//! unmatched terminators, unreadable headers) abort a strict parse with
//! [`error::GwError::Structural`]; in lenient mode, the default, the line is
//! dropped and a warning is recorded, on the person or family whose record
//! held the line when there is one. Validation findings (birth after death,
//! a family without members, a one-sided back-reference) never abort: they are
//! attached to the entity and returned next to the graph in a
//! [`validation::Validated`].
//!
//! ## Quick Start
//! ```
//! use gwgraph::parser::GwParser;
//!
//! let source = "fam CORNO Joseph + THOMAS Marie\nbeg\n- h Jean\n- f Anne\nend\n";
//! let parsed = GwParser::default().parse(source).unwrap();
//! let genealogy = parsed.value;
//! let family = genealogy.family("FAM_001").unwrap();
//! assert_eq!(family.husband(), Some("CORNO_Joseph_0"));
//! assert_eq!(family.children().len(), 2);
//! ```
//!
//! ## Logging
//! The crate emits `tracing` events (one `info` per parse, `warn` for every
//! dropped line or synthesized placeholder, `debug` per record). Installing a
//! subscriber is left to the application.

pub mod config;
pub mod construct;
pub mod date;
pub mod entity;
pub mod error;
pub mod interface;
pub mod parser;
pub mod records;
pub mod tokenizer;
pub mod validation;

pub use construct::Genealogy;
pub use date::Date;
pub use error::{GwError, Result};
pub use parser::GwParser;
pub use validation::{Finding, Severity, Validated};
