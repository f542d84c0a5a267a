// MCML Roster - Core Library
// Fuzzy person lookup over a local copy of the mcml.ai team directory.
// Exposes all modules for use in the CLI, the API server and tests.

pub mod config;
pub mod db;
pub mod error;
pub mod matcher;    // Scoring + ranking
pub mod normalize;  // Canonical name form
pub mod person;
pub mod service;    // search / check / info / export
pub mod sources;    // Crawler, CSV and fixed-list sources

// Re-export commonly used types
pub use config::{Config, MatchPolicy};
pub use db::{setup_database, ExportBatch, ExportSummary, Store, StoreMetadata};
pub use error::{LookupError, Result};
pub use matcher::{
    rank, score_names, score_record, CandidateName, NormalizedQuery, RankedMatch, ScoreTuple,
};
pub use normalize::{normalize, NormalizedName};
pub use person::PersonRecord;
pub use service::{check, export, info, search, CheckOutcome, PersonQuery};
pub use sources::{CsvSource, DirectorySource, PersonSource, StaticSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
