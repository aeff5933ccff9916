//! Error types for the splice engine
//!
//! Every variant is terminal for the request that produced it. Nothing here is
//! retried automatically: planning, encoding and padding are deterministic for
//! identical inputs, so a caller may only retry after changing the inputs.

use thiserror::Error;

/// Result type for splice engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the splice engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Durations or target size make the plan mathematically infeasible
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encoding engine failed, timed out, or produced oversized output
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// Encoded output already exceeds the target before padding
    #[error("Padding overflow: file is {current} bytes, target is {target} bytes")]
    PaddingOverflow { current: u64, target: u64 },

    /// Post-write size does not equal the target
    #[error("Padding mismatch: file is {actual} bytes, target is {target} bytes")]
    PaddingMismatch { actual: u64, target: u64 },

    /// Media probe or asset validation error
    #[error("Probe error: {0}")]
    Probe(String),

    /// ID3 tag read/write error
    #[error("Metadata error: {0}")]
    Metadata(#[from] id3::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (task join failures and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}
