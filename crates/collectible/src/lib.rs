//! Capability-gated collectible records.
//!
//! This crate implements the lifecycle of a family of collectible records:
//! a record type is published once, its initializer derives the admin
//! credential from the one-time witness, the admin credential gates batch
//! minting, transfers are gated either by ownership alone or additionally by
//! a delegate credential, and records are destroyed by their owner.
//!
//! # Overview
//!
//! - **Collection**: handle to one deployed record type; all lifecycle
//!   operations hang off it.
//! - **Record**: a uniquely identified, exclusively owned value generic over
//!   its [`FieldSchema`].
//! - **DisplayBinding**: field-name → template mapping used by viewers.
//!
//! # Example
//!
//! ```
//! use collectible::{AdminCredential, CollectionDef, Metadata, Record, initialize, publish};
//! use ledger::{MemoryLedger, ObjectStore, Principal};
//!
//! # fn example() -> collectible::Result<()> {
//! let mut ledger = MemoryLedger::new();
//! let deployer = Principal::new("deployer");
//! let alice = Principal::new("alice");
//!
//! let witness = publish::<Metadata>(&mut ledger, &CollectionDef::new("cats"), &deployer)?;
//! let genesis = initialize(&mut ledger, witness)?;
//!
//! let cats = genesis.collection;
//!
//! // The admin credential stays in the ledger; the deployer lends it out.
//! let ids = ledger.borrow_object(
//!     genesis.admin,
//!     &deployer,
//!     |ledger, admin: &AdminCredential<Metadata>| {
//!         cats.mint(ledger, admin, 10, Metadata::new("Tom", "QmTom"), &alice)
//!     },
//! )?;
//!
//! let record: Record<Metadata> = ledger.take_object(ids[0], &alice)?;
//! cats.burn(&mut ledger, record)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod collection;
mod display;
mod error;
mod init;
mod lifecycle;
mod record;
#[cfg(test)]
mod testing;

pub use collection::{Collection, CollectionDef, publish};
pub use display::{DisplayBinding, DisplayTemplate, standard_template};
pub use error::{Error, Result};
pub use init::{Genesis, initialize};
pub use record::{FieldSchema, Metadata, Record};

// Credential types appear in every lifecycle signature.
pub use capability::{
    AdminCredential, Credential, DelegateCredential, TransferPolicy, TypeTag, TypeWitness,
};
