#![allow(dead_code)]

use gwgraph::{Genealogy, GwParser, Validated};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once; `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub fn lenient(source: &str) -> Validated<Genealogy> {
    init_tracing();
    GwParser::lenient().parse(source).expect("lenient parse never fails")
}
