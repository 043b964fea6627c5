//! Error types for lattice-engine
//!
//! These are fatal conditions (unreadable documents, broken scripts). Commands that
//! fail validation are not errors: they produce a [`crate::DispatchResult::Rejected`].

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lattice-engine
#[derive(Debug, Error)]
pub enum Error {
    /// Error from the core data structures (bad range, bad color, ...)
    #[error(transparent)]
    Core(#[from] lattice_core::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document written by an unknown format version
    #[error("Unsupported document version {found} (expected at most {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// A document that cannot be adopted as-is
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl Error {
    /// Create an invalid document error
    pub fn invalid_document<S: Into<String>>(msg: S) -> Self {
        Error::InvalidDocument(msg.into())
    }
}
