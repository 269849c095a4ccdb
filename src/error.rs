use thiserror::Error;

#[derive(Error, Debug)]
pub enum GwError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Structural error{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Structural { message: String, line: Option<usize> },
    #[error("Date format not recognized: {0}")]
    DateFormat(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Duplicate identity: {0}")]
    Duplicate(String),
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl GwError {
    pub fn structural(message: impl Into<String>, line: Option<usize>) -> Self {
        GwError::Structural { message: message.into(), line }
    }
}

impl From<config::ConfigError> for GwError {
    fn from(e: config::ConfigError) -> Self {
        GwError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GwError>;
