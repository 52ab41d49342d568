//! The host ledger interface.

use tracing::{debug, warn};

use crate::{
    Error, Event, IdentityAllocator, LedgerObject, ObjectFilter, ObjectId, ObjectKind,
    OwnedObject, Principal, Result, StoredObject, TypeEntry,
};

/// Object storage the collectible core runs against.
///
/// Every object has exactly one owner. Taking an object out checks that the
/// caller is that owner; putting it back (under any owner) makes it live again.
pub trait ObjectStore: IdentityAllocator {
    /// Register a record type. Fails with [`Error::AlreadyPublished`] if the
    /// name is taken.
    fn register_type(&mut self, entry: &TypeEntry) -> Result<()>;

    /// Look up a published record type by name.
    fn type_entry(&self, name: &str) -> Result<TypeEntry>;

    /// Store objects and append events in one atomic step.
    ///
    /// Every object id must be live. Nothing is written if any check fails.
    fn commit(&mut self, objects: Vec<StoredObject>, events: &[Event]) -> Result<()>;

    /// Remove an object of the given kind, provided `caller` owns it.
    fn take(&mut self, id: ObjectId, kind: ObjectKind, caller: &Principal) -> Result<StoredObject>;

    /// Retire `id` for good and append `events` in one atomic step.
    ///
    /// Any object still stored under `id` goes with it. Fails with
    /// [`Error::InvalidIdentity`] and writes nothing if `id` is not live.
    fn destroy(&mut self, id: ObjectId, events: &[Event]) -> Result<()>;

    /// Read an object without taking it.
    fn get(&self, id: ObjectId) -> Result<StoredObject>;

    fn list(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>>;

    fn append(&mut self, event: &Event) -> Result<()>;

    /// All events for one object, oldest first.
    fn history(&self, id: ObjectId) -> Result<Vec<Event>>;

    /// Hand `object` to `to`.
    fn transfer_object<O: LedgerObject>(&mut self, object: O, to: &Principal) -> Result<()>
    where
        Self: Sized,
    {
        let stored = object.into_stored(to)?;
        debug!(id = %stored.id, kind = %stored.kind, to = %to, "Transferring object");
        self.commit(vec![stored], &[])
    }

    /// Take a typed object out of the ledger on behalf of its owner.
    fn take_object<O: LedgerObject>(&mut self, id: ObjectId, caller: &Principal) -> Result<O>
    where
        Self: Sized,
    {
        O::from_stored(OwnedObject::new(self.take(id, O::KIND, caller)?))
    }

    /// Take an object out and hand it to `f` by value.
    ///
    /// If `f` fails the object is put back exactly as it was, so a rejected
    /// operation leaves the ledger untouched. If putting it back fails too,
    /// the result is [`Error::Lost`]. On success whatever `f` did with the
    /// object (store it under a new owner, destroy it) stands.
    fn consume_object<O, T, E, F>(
        &mut self,
        id: ObjectId,
        caller: &Principal,
        f: F,
    ) -> std::result::Result<T, E>
    where
        Self: Sized,
        O: LedgerObject,
        E: From<Error> + std::fmt::Display,
        F: FnOnce(&mut Self, O) -> std::result::Result<T, E>,
    {
        let stored = self.take(id, O::KIND, caller)?;
        let snapshot = stored.clone();
        let outcome = match O::from_stored(OwnedObject::new(stored)) {
            Ok(object) => f(self, object),
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(value) => Ok(value),
            Err(e) => match self.commit(vec![snapshot], &[]) {
                Ok(()) => Err(e),
                Err(restore) => {
                    warn!(%id, error = %e, "Operation failed and its object could not be restored");
                    Err(Error::Lost {
                        id,
                        source: Box::new(restore),
                    }
                    .into())
                }
            },
        }
    }

    /// Lend an object to `f` by reference without moving it.
    ///
    /// Used for credentials: presenting one grants read-only use for the
    /// duration of the call.
    fn borrow_object<O, T, E, F>(
        &mut self,
        id: ObjectId,
        caller: &Principal,
        f: F,
    ) -> std::result::Result<T, E>
    where
        Self: Sized,
        O: LedgerObject,
        E: From<Error>,
        F: FnOnce(&mut Self, &O) -> std::result::Result<T, E>,
    {
        let stored = self.get(id)?;
        check_take(&stored, O::KIND, caller)?;
        let object = O::from_stored(OwnedObject::new(stored))?;
        f(self, &object)
    }
}

/// Shared precondition for [`ObjectStore::take`] implementations.
pub(crate) fn check_take(
    object: &StoredObject,
    kind: ObjectKind,
    caller: &Principal,
) -> Result<()> {
    if object.kind != kind {
        return Err(Error::KindMismatch {
            id: object.id,
            expected: kind,
            actual: object.kind,
        });
    }
    if object.owner != *caller {
        return Err(Error::NotOwner {
            id: object.id,
            caller: caller.clone(),
        });
    }
    Ok(())
}
