//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The ledger file does not exist.
    ///
    /// This typically means no collection has been published yet.
    #[error("ledger not found at {path}. Run 'tokenctl publish' first")]
    LedgerNotFound { path: PathBuf },

    /// The caller holds no credential of the required kind.
    #[error("{owner} holds no {kind} for collection '{collection}'")]
    MissingCredential {
        kind: &'static str,
        collection: String,
        owner: String,
    },

    /// An object id on the command line could not be parsed.
    #[error("invalid object id '{0}'")]
    InvalidId(String),

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the record lifecycle.
    #[error(transparent)]
    Collectible(#[from] collectible::Error),

    /// An error occurred in the ledger.
    #[error(transparent)]
    Ledger(#[from] ledger::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
