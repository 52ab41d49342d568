//! Ledger doubles shared by the unit tests.

use ledger::{
    Error, Event, IdentityAllocator, MemoryLedger, ObjectFilter, ObjectId, ObjectKind,
    ObjectStore, Principal, Result, StoredObject, TypeEntry,
};

/// A [`MemoryLedger`] that can be told to refuse batch writes.
///
/// Remembers every id it hands out so tests can check what became of them.
#[derive(Debug, Default)]
pub(crate) struct RefusingLedger {
    inner: MemoryLedger,
    pub(crate) allocated: Vec<ObjectId>,
    pub(crate) refusing: bool,
}

impl IdentityAllocator for RefusingLedger {
    fn allocate(&mut self) -> Result<ObjectId> {
        let id = self.inner.allocate()?;
        self.allocated.push(id);
        Ok(id)
    }

    fn release(&mut self, id: ObjectId) -> Result<()> {
        self.inner.release(id)
    }

    fn is_live(&self, id: ObjectId) -> Result<bool> {
        self.inner.is_live(id)
    }
}

impl ObjectStore for RefusingLedger {
    fn register_type(&mut self, entry: &TypeEntry) -> Result<()> {
        self.inner.register_type(entry)
    }

    fn type_entry(&self, name: &str) -> Result<TypeEntry> {
        self.inner.type_entry(name)
    }

    fn commit(&mut self, objects: Vec<StoredObject>, events: &[Event]) -> Result<()> {
        if self.refusing {
            return Err(Error::Corrupt("batch writes are refused".to_string()));
        }
        self.inner.commit(objects, events)
    }

    fn take(&mut self, id: ObjectId, kind: ObjectKind, caller: &Principal) -> Result<StoredObject> {
        self.inner.take(id, kind, caller)
    }

    fn destroy(&mut self, id: ObjectId, events: &[Event]) -> Result<()> {
        self.inner.destroy(id, events)
    }

    fn get(&self, id: ObjectId) -> Result<StoredObject> {
        self.inner.get(id)
    }

    fn list(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>> {
        self.inner.list(filter)
    }

    fn append(&mut self, event: &Event) -> Result<()> {
        self.inner.append(event)
    }

    fn history(&self, id: ObjectId) -> Result<Vec<Event>> {
        self.inner.history(id)
    }
}
