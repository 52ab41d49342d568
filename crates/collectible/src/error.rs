use ledger::ObjectId;
use thiserror::Error;

/// Errors from the record lifecycle.
///
/// The first three variants are the caller contract violations every gated
/// operation can report. They are flattened out of the capability and ledger
/// errors so callers can match on them directly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No live credential for this record type was presented.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// A count or field argument violated a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A released identity was referenced again.
    #[error("invalid identity: {0}")]
    InvalidIdentity(ObjectId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Ledger(ledger::Error),
}

impl From<ledger::Error> for Error {
    fn from(e: ledger::Error) -> Self {
        match e {
            ledger::Error::InvalidIdentity(id) => Error::InvalidIdentity(id),
            other => Error::Ledger(other),
        }
    }
}

impl From<capability::Error> for Error {
    fn from(e: capability::Error) -> Self {
        match e {
            capability::Error::NotAuthorized(reason) => Error::NotAuthorized(reason),
            capability::Error::InvalidArgument(reason) | capability::Error::Parse(reason) => {
                Error::InvalidArgument(reason)
            }
            capability::Error::Ledger(e) => e.into(),
            other => Error::InvalidArgument(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
