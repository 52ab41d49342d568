//! Possession-based credentials for collectible records.
//!
//! Core principle: **holding the credential is the authorization.** There is
//! no role table and no identity check; a gated operation asks for a live
//! credential whose [`TypeTag`] matches the record type, and nothing else.
//!
//! - [`TypeWitness`]: issued once when a record type is published, consumed
//!   to derive the admin credential
//! - [`AdminCredential`]: gates minting and delegate issuance
//! - [`DelegateCredential`]: gates transfers under [`TransferPolicy::Delegated`]

mod credential;
mod error;
mod policy;
mod witness;

pub use credential::{AdminCredential, Credential, DelegateCredential, TypeTag};
pub use error::{Error, Result};
pub use policy::TransferPolicy;
pub use witness::TypeWitness;
