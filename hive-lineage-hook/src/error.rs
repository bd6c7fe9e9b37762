//! Error types for hive-lineage-hook
//!
//! Every failure inside the hook lands in one of these buckets. None of them
//! ever reach the host engine: the dispatcher logs them and moves on.

use thiserror::Error;

use crate::lineage::ParseError;

/// Main error type for the hive-lineage-hook library
#[derive(Error, Debug)]
pub enum Error {
    /// Query text could not be turned into lineage facts
    #[error("extraction error: {0}")]
    Extraction(#[from] ParseError),

    /// Record serialization or payload encoding failed
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Connection, DNS, TLS, timeout or response stream failure
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Collector answered with a non-2xx status
    #[error("collector rejected record ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short name of the error bucket, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Extraction(_) => "extraction",
            Error::Encoding(_) => "encoding",
            Error::Delivery(_) | Error::Rejected { .. } => "delivery",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Result type alias for hive-lineage-hook
pub type Result<T> = std::result::Result<T, Error>;
