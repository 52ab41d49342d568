use crate::{ObjectId, ObjectKind, Principal};
use thiserror::Error;

/// Ledger errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// The identity was never allocated or has already been released.
    #[error("invalid identity: {0}")]
    InvalidIdentity(ObjectId),

    /// The caller tried to take an object it does not own.
    #[error("{caller} does not own object {id}")]
    NotOwner { id: ObjectId, caller: Principal },

    #[error("object {id} is a {actual}, expected {expected}")]
    KindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// A record type with this name already exists in the ledger.
    #[error("record type '{0}' is already published")]
    AlreadyPublished(String),

    /// An operation on a taken object failed and the object could not be
    /// put back.
    #[error("object {id} was lost after a failed operation: {source}")]
    Lost {
        id: ObjectId,
        #[source]
        source: Box<Error>,
    },

    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
