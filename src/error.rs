//! Error taxonomy shared by the fetcher, the flattener and the stores.

use thiserror::Error;

/// Failures surfaced by catalogue operations.
///
/// Nothing here is retried or swallowed: a caller gets either a complete
/// table or one of these.
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// Transport failure, non-success status or unreadable response body.
    #[error("Fetch failed for catalogue '{catalogue}': {reason}")]
    Fetch { catalogue: String, reason: String },

    /// The payload is not well-formed XML.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Well-formed XML that breaks an assumption the flattener relies on.
    #[error("Malformed catalogue structure at {term}: {reason}")]
    Structure { term: String, reason: String },

    /// The table store rejected a read or write.
    #[error("Persistence error on table '{table}': {reason}")]
    Persistence { table: String, reason: String },

    /// User data file could not be read.
    #[error("Ingest error for '{path}': {reason}")]
    Ingest { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogueError {
    pub(crate) fn persistence(table: &str, reason: impl ToString) -> Self {
        CatalogueError::Persistence {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn structure(term: &str, reason: impl ToString) -> Self {
        CatalogueError::Structure {
            term: term.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for CatalogueError {
    fn from(e: config::ConfigError) -> Self {
        CatalogueError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogueError>;
