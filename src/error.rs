// ⚠️ Error taxonomy for lookups, exports and the record store

use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, LookupError>;

/// Errors surfaced to the CLI / API boundary
#[derive(Debug, Error)]
pub enum LookupError {
    /// Both name fields are empty after normalization (caller error)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Network or parsing failure while collecting people for an export
    #[error("scrape failed at {page}: {reason}")]
    ScrapeFailure { page: String, reason: String },

    /// Underlying SQLite database unreachable or corrupt
    #[error("store access failed: {0}")]
    StoreAccess(#[from] rusqlite::Error),

    /// A record violates the stored-record invariants
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Match policy file could not be read or is out of range
    #[error("invalid match policy: {0}")]
    Policy(String),

    /// IO error (database directory, fixture files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LookupError {
    pub fn scrape(page: impl Into<String>, reason: impl ToString) -> Self {
        LookupError::ScrapeFailure {
            page: page.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this error kind
    pub fn exit_code(&self) -> u8 {
        match self {
            LookupError::InvalidQuery(_) => 2,
            LookupError::ScrapeFailure { .. } => 3,
            LookupError::StoreAccess(_) => 4,
            _ => 1,
        }
    }
}
