//! Error taxonomy for the review pipeline.
//!
//! Failures fall into four kinds with different handling policies:
//!
//! | Kind | Variant(s) | Policy |
//! |------|-----------|--------|
//! | Configuration | [`Error::EmptyDataset`], [`Error::Config`] | fatal, reported immediately |
//! | Transient ingestion | [`Error::Embedding`], [`Error::Storage`] | retried per batch, then skipped |
//! | Strict malformed output | [`Error::StyleAnalysis`] | aborts the generation call |
//! | Infrastructure | [`Error::Database`], [`Error::Io`] | propagated |
//!
//! Tolerant malformed-output failures (the primary text-analysis operations)
//! never surface here: they degrade to empty/default values inside
//! [`crate::analysis`] and are logged instead.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the review pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// An input dataset contained no rows. Fatal to the learning call.
    #[error("no data found in the provided {input}")]
    EmptyDataset {
        /// Which input was empty (`"review corpus"` or `"watched catalog"`).
        input: &'static str,
    },

    /// Invalid or inconsistent configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The embedding capability failed (transport or provider error).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The completion capability failed (transport or provider error).
    #[error("completion error: {0}")]
    Completion(String),

    /// The vector index rejected one or more records during ingestion.
    #[error("storage error: {0}")]
    Storage(String),

    /// Confidence scoring produced output the caller cannot safely ignore.
    #[error("style analysis failed: {0}")]
    StyleAnalysis(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (index directory creation).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dataset_names_the_input() {
        let e = Error::EmptyDataset {
            input: "review corpus",
        };
        assert_eq!(e.to_string(), "no data found in the provided review corpus");
    }

    #[test]
    fn style_analysis_is_distinguishable() {
        let e = Error::StyleAnalysis("score 1.3 outside [0, 1]".to_string());
        assert!(matches!(e, Error::StyleAnalysis(_)));
        assert!(e.to_string().contains("style analysis"));
    }

    #[test]
    fn error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing dir");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("missing dir"));
    }
}
