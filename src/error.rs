//! Error types for the watermark removal library

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the watermark removal library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF structure could not be parsed or written
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document requires a password we do not have
    #[error("PDF is encrypted")]
    Encrypted,

    /// A stream's filter chain cannot be decoded (non-fatal, stream skipped)
    #[error("unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    /// Object graph invariant violated while preparing the output
    #[error("serialization error: {0}")]
    Serialization(String),
}
