//! Host ledger for collectible records.
//!
//! This crate is the environment the collectible core runs in: it hands out
//! identities, keeps every owned object (records, credentials, display
//! bindings) addressable by id, remembers which record types have been
//! published, and keeps an audit log of everything that happened to each
//! object.
//!
//! # Core Concepts
//!
//! ## IdentityAllocator
//!
//! The [`IdentityAllocator`] issues [`ObjectId`]s that are never reused. A
//! released id is retired for good; releasing it again is an
//! [`Error::InvalidIdentity`].
//!
//! ## ObjectStore
//!
//! The [`ObjectStore`] trait is the interface the core talks to. Objects are
//! owned by exactly one [`Principal`]. [`ObjectStore::take`] only hands an
//! object to its current owner, which is how ownership is enforced without any
//! access-control list.
//!
//! Two implementations are provided:
//! - [`SqliteLedger`]: persistent, one transaction per batch write
//! - [`MemoryLedger`]: in-process, for tests and embedding
//!
//! # Example
//!
//! ```
//! use ledger::{IdentityAllocator, MemoryLedger};
//!
//! let mut ledger = MemoryLedger::new();
//! let id = ledger.allocate()?;
//! ledger.release(id)?;
//! assert!(ledger.release(id).is_err());
//! # Ok::<(), ledger::Error>(())
//! ```

mod allocator;
mod error;
mod event;
mod host;
mod memory;
mod object;
mod store;

pub use allocator::IdentityAllocator;
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use host::ObjectStore;
pub use memory::MemoryLedger;
pub use object::{
    LedgerObject, ObjectFilter, ObjectId, ObjectKind, OwnedObject, Principal, StoredObject,
    TypeEntry,
};
pub use store::SqliteLedger;
