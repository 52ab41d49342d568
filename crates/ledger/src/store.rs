//! SQLite ledger implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::host::check_take;
use crate::{
    Error, Event, IdentityAllocator, ObjectFilter, ObjectId, ObjectKind, ObjectStore, Principal,
    Result, StoredObject, TypeEntry,
};

/// SQLite-backed ledger.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open or create a ledger at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let ledger = Self { conn };
        ledger.init_schema()?;
        Ok(ledger)
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let ledger = Self { conn };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS types (
                name TEXT PRIMARY KEY,
                deployment TEXT NOT NULL,
                publisher TEXT NOT NULL,
                published_at TEXT NOT NULL,
                definition TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                allocated_at TEXT NOT NULL,
                retired_at TEXT
            );
            CREATE TABLE IF NOT EXISTS objects (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                type_name TEXT NOT NULL,
                deployment TEXT NOT NULL,
                owner TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_objects_owner
                ON objects(owner, kind);
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                object_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_object
                ON events(object_id);
            "#,
        )?;
        Ok(())
    }

    fn load_object(&self, id: ObjectId) -> Result<Option<StoredObject>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, kind, type_name, deployment, owner, data, updated_at
                 FROM objects WHERE id = ?1",
                [id.to_string()],
                RawObject::from_row,
            )
            .optional()?;
        raw.map(RawObject::decode).transpose()
    }
}

impl IdentityAllocator for SqliteLedger {
    fn allocate(&mut self) -> Result<ObjectId> {
        loop {
            let id = ObjectId::random();
            // The primary key covers retired rows too, so an id is never handed out twice.
            let inserted = self.conn.execute(
                "INSERT OR IGNORE INTO identities (id, allocated_at) VALUES (?1, ?2)",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )?;
            if inserted == 1 {
                debug!(%id, "Allocated identity");
                return Ok(id);
            }
        }
    }

    fn release(&mut self, id: ObjectId) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE identities SET retired_at = ?2 WHERE id = ?1 AND retired_at IS NULL",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(Error::InvalidIdentity(id));
        }
        debug!(%id, "Released identity");
        Ok(())
    }

    fn is_live(&self, id: ObjectId) -> Result<bool> {
        let live = self
            .conn
            .query_row(
                "SELECT retired_at IS NULL FROM identities WHERE id = ?1",
                [id.to_string()],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;
        Ok(live.unwrap_or(false))
    }
}

impl ObjectStore for SqliteLedger {
    fn register_type(&mut self, entry: &TypeEntry) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO types (name, deployment, publisher, published_at, definition)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.name,
                entry.deployment.to_string(),
                entry.publisher.as_str(),
                entry.published_at.to_rfc3339(),
                serde_json::to_string(&entry.definition)?,
            ],
        )?;
        if inserted == 0 {
            return Err(Error::AlreadyPublished(entry.name.clone()));
        }
        Ok(())
    }

    fn type_entry(&self, name: &str) -> Result<TypeEntry> {
        let row = self
            .conn
            .query_row(
                "SELECT name, deployment, publisher, published_at, definition
                 FROM types WHERE name = ?1",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("record type '{name}'")))?;

        let (name, deployment, publisher, published_at, definition) = row;
        Ok(TypeEntry {
            name,
            deployment: parse_id(&deployment)?,
            publisher: Principal::new(publisher),
            published_at: parse_time(&published_at)?,
            definition: serde_json::from_str(&definition)?,
        })
    }

    fn commit(&mut self, objects: Vec<StoredObject>, events: &[Event]) -> Result<()> {
        for object in &objects {
            if !self.is_live(object.id)? {
                return Err(Error::InvalidIdentity(object.id));
            }
        }

        let tx = self.conn.transaction()?;
        for object in &objects {
            tx.execute(
                "INSERT INTO objects (id, kind, type_name, deployment, owner, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    owner = excluded.owner,
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                params![
                    object.id.to_string(),
                    object.kind.as_str(),
                    object.type_name,
                    object.deployment.to_string(),
                    object.owner.as_str(),
                    serde_json::to_string(&object.data)?,
                    object.updated_at.to_rfc3339(),
                ],
            )?;
        }
        for event in events {
            insert_event(&tx, event)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn take(&mut self, id: ObjectId, kind: ObjectKind, caller: &Principal) -> Result<StoredObject> {
        let object = self
            .load_object(id)?
            .ok_or_else(|| Error::NotFound(format!("object {id}")))?;
        check_take(&object, kind, caller)?;
        self.conn
            .execute("DELETE FROM objects WHERE id = ?1", [id.to_string()])?;
        Ok(object)
    }

    fn destroy(&mut self, id: ObjectId, events: &[Event]) -> Result<()> {
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE identities SET retired_at = ?2 WHERE id = ?1 AND retired_at IS NULL",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(Error::InvalidIdentity(id));
        }
        tx.execute("DELETE FROM objects WHERE id = ?1", [id.to_string()])?;
        for event in events {
            insert_event(&tx, event)?;
        }
        tx.commit()?;
        debug!(%id, "Destroyed identity");
        Ok(())
    }

    fn get(&self, id: ObjectId) -> Result<StoredObject> {
        self.load_object(id)?
            .ok_or_else(|| Error::NotFound(format!("object {id}")))
    }

    fn list(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, type_name, deployment, owner, data, updated_at
             FROM objects
             WHERE (?1 IS NULL OR owner = ?1)
               AND (?2 IS NULL OR kind = ?2)
               AND (?3 IS NULL OR type_name = ?3)
             ORDER BY updated_at, id",
        )?;

        let rows = stmt
            .query_map(
                params![
                    filter.owner.as_ref().map(Principal::as_str),
                    filter.kind.map(ObjectKind::as_str),
                    filter.type_name.as_deref(),
                ],
                RawObject::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawObject::decode).collect()
    }

    fn append(&mut self, event: &Event) -> Result<()> {
        insert_event(&self.conn, event)
    }

    fn history(&self, id: ObjectId) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, object_id, timestamp, data FROM events
             WHERE object_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, object_id, timestamp, data)| -> Result<Event> {
                Ok(Event {
                    id: id
                        .parse()
                        .map_err(|_| Error::Corrupt(format!("event id '{id}'")))?,
                    object_id: parse_id(&object_id)?,
                    timestamp: parse_time(&timestamp)?,
                    kind: serde_json::from_str(&data)?,
                })
            })
            .collect()
    }
}

/// Row as read from the `objects` table, before parsing.
struct RawObject {
    id: String,
    kind: String,
    type_name: String,
    deployment: String,
    owner: String,
    data: String,
    updated_at: String,
}

impl RawObject {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            type_name: row.get(2)?,
            deployment: row.get(3)?,
            owner: row.get(4)?,
            data: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<StoredObject> {
        Ok(StoredObject {
            id: parse_id(&self.id)?,
            kind: ObjectKind::parse(&self.kind)
                .ok_or_else(|| Error::Corrupt(format!("object kind '{}'", self.kind)))?,
            type_name: self.type_name,
            deployment: parse_id(&self.deployment)?,
            owner: Principal::new(self.owner),
            data: serde_json::from_str(&self.data)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (id, object_id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.id.to_string(),
            event.object_id.to_string(),
            event.timestamp.to_rfc3339(),
            event.kind.name(),
            serde_json::to_string(&event.kind)?,
        ],
    )?;
    Ok(())
}

fn parse_id(s: &str) -> Result<ObjectId> {
    s.parse()
        .map_err(|_| Error::Corrupt(format!("object id '{s}'")))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    s.parse()
        .map_err(|_| Error::Corrupt(format!("timestamp '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;

    fn record(id: ObjectId, owner: &str) -> StoredObject {
        StoredObject {
            id,
            kind: ObjectKind::Record,
            type_name: "cats".to_string(),
            deployment: id,
            owner: Principal::new(owner),
            data: serde_json::json!({ "name": "Tom" }),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_release_retires_forever() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let id = ledger.allocate().unwrap();
        assert!(ledger.is_live(id).unwrap());

        ledger.release(id).unwrap();
        assert!(!ledger.is_live(id).unwrap());
        assert!(matches!(ledger.release(id), Err(Error::InvalidIdentity(_))));
    }

    #[test]
    fn test_commit_take_roundtrip() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let id = ledger.allocate().unwrap();
        let event = Event::new(id, EventKind::Minted { to: "alice".into() });
        ledger.commit(vec![record(id, "alice")], &[event]).unwrap();

        let owned = ledger
            .list(&ObjectFilter::owned_by(&"alice".into()).kind(ObjectKind::Record))
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].data["name"], "Tom");

        assert!(matches!(
            ledger.take(id, ObjectKind::Record, &"bob".into()),
            Err(Error::NotOwner { .. })
        ));
        let taken = ledger.take(id, ObjectKind::Record, &"alice".into()).unwrap();
        assert_eq!(taken.owner.as_str(), "alice");
        assert!(ledger.list(&ObjectFilter::default()).unwrap().is_empty());

        let history = ledger.history(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind.name(), "minted");
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let good = ledger.allocate().unwrap();
        let dead = ledger.allocate().unwrap();
        ledger.release(dead).unwrap();

        let result = ledger.commit(vec![record(good, "alice"), record(dead, "alice")], &[]);
        assert!(matches!(result, Err(Error::InvalidIdentity(id)) if id == dead));
        assert!(ledger.list(&ObjectFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_destroy_is_one_write() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let id = ledger.allocate().unwrap();
        ledger.commit(vec![record(id, "alice")], &[]).unwrap();

        ledger
            .destroy(id, &[Event::new(id, EventKind::Burned)])
            .unwrap();
        assert!(!ledger.is_live(id).unwrap());
        assert!(matches!(ledger.get(id), Err(Error::NotFound(_))));
        assert_eq!(ledger.history(id).unwrap().len(), 1);

        // A rejected destroy leaves no event behind.
        assert!(matches!(
            ledger.destroy(id, &[Event::new(id, EventKind::Burned)]),
            Err(Error::InvalidIdentity(_))
        ));
        assert_eq!(ledger.history(id).unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let id = {
            let mut ledger = SqliteLedger::open(&path).unwrap();
            let id = ledger.allocate().unwrap();
            ledger.commit(vec![record(id, "alice")], &[]).unwrap();
            ledger
                .register_type(&TypeEntry {
                    name: "cats".to_string(),
                    deployment: id,
                    publisher: "alice".into(),
                    published_at: Utc::now(),
                    definition: serde_json::json!({ "delegates": 0 }),
                })
                .unwrap();
            id
        };

        let ledger = SqliteLedger::open(&path).unwrap();
        assert!(ledger.is_live(id).unwrap());
        assert_eq!(ledger.get(id).unwrap().owner.as_str(), "alice");
        let entry = ledger.type_entry("cats").unwrap();
        assert_eq!(entry.definition["delegates"], 0);
    }

    #[test]
    fn test_register_type_twice() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let entry = TypeEntry {
            name: "cats".to_string(),
            deployment: ledger.allocate().unwrap(),
            publisher: "alice".into(),
            published_at: Utc::now(),
            definition: serde_json::Value::Null,
        };
        ledger.register_type(&entry).unwrap();
        assert!(matches!(
            ledger.register_type(&entry),
            Err(Error::AlreadyPublished(_))
        ));
    }
}
