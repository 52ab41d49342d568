//! Capability error types.

use thiserror::Error;

/// Capability errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller did not present a live credential for this record type.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// An argument violated a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to parse a transfer policy.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An error occurred in the host ledger.
    #[error(transparent)]
    Ledger(#[from] ledger::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
