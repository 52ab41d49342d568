//! In-memory ledger.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::host::check_take;
use crate::{
    Error, Event, IdentityAllocator, ObjectFilter, ObjectId, ObjectKind, ObjectStore, Principal,
    Result, StoredObject, TypeEntry,
};

/// A ledger that lives only as long as the value (useful for testing).
#[derive(Debug, Default)]
pub struct MemoryLedger {
    live: HashSet<ObjectId>,
    retired: HashSet<ObjectId>,
    types: HashMap<String, TypeEntry>,
    objects: HashMap<ObjectId, StoredObject>,
    events: Vec<Event>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityAllocator for MemoryLedger {
    fn allocate(&mut self) -> Result<ObjectId> {
        loop {
            let id = ObjectId::random();
            if !self.live.contains(&id) && !self.retired.contains(&id) {
                self.live.insert(id);
                debug!(%id, "Allocated identity");
                return Ok(id);
            }
        }
    }

    fn release(&mut self, id: ObjectId) -> Result<()> {
        if !self.live.remove(&id) {
            return Err(Error::InvalidIdentity(id));
        }
        self.retired.insert(id);
        debug!(%id, "Released identity");
        Ok(())
    }

    fn is_live(&self, id: ObjectId) -> Result<bool> {
        Ok(self.live.contains(&id))
    }
}

impl ObjectStore for MemoryLedger {
    fn register_type(&mut self, entry: &TypeEntry) -> Result<()> {
        if self.types.contains_key(&entry.name) {
            return Err(Error::AlreadyPublished(entry.name.clone()));
        }
        self.types.insert(entry.name.clone(), entry.clone());
        Ok(())
    }

    fn type_entry(&self, name: &str) -> Result<TypeEntry> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("record type '{name}'")))
    }

    fn commit(&mut self, objects: Vec<StoredObject>, events: &[Event]) -> Result<()> {
        if let Some(dead) = objects.iter().find(|o| !self.live.contains(&o.id)) {
            return Err(Error::InvalidIdentity(dead.id));
        }
        for object in objects {
            self.objects.insert(object.id, object);
        }
        self.events.extend_from_slice(events);
        Ok(())
    }

    fn take(&mut self, id: ObjectId, kind: ObjectKind, caller: &Principal) -> Result<StoredObject> {
        let object = self
            .objects
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("object {id}")))?;
        check_take(object, kind, caller)?;
        self.objects
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("object {id}")))
    }

    fn destroy(&mut self, id: ObjectId, events: &[Event]) -> Result<()> {
        self.release(id)?;
        self.objects.remove(&id);
        self.events.extend_from_slice(events);
        Ok(())
    }

    fn get(&self, id: ObjectId) -> Result<StoredObject> {
        self.objects
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {id}")))
    }

    fn list(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>> {
        let mut objects: Vec<_> = self
            .objects
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        objects.sort_by_key(|o| (o.updated_at, o.id));
        Ok(objects)
    }

    fn append(&mut self, event: &Event) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn history(&self, id: ObjectId) -> Result<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.object_id == id)
            .cloned()
            .collect())
    }
}
