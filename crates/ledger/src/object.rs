//! Owned objects and the identifiers that address them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// A globally unique identifier for a ledger object or deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// An owner address. Opaque to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What an object is, as far as the host is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Record,
    AdminCredential,
    DelegateCredential,
    Display,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Record => "record",
            ObjectKind::AdminCredential => "admin_credential",
            ObjectKind::DelegateCredential => "delegate_credential",
            ObjectKind::Display => "display",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "record" => Some(ObjectKind::Record),
            "admin_credential" => Some(ObjectKind::AdminCredential),
            "delegate_credential" => Some(ObjectKind::DelegateCredential),
            "display" => Some(ObjectKind::Display),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object at rest in the ledger, owned by exactly one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Name of the record type this object belongs to.
    pub type_name: String,
    /// Deployment of that record type.
    pub deployment: ObjectId,
    pub owner: Principal,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// A published record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub name: String,
    pub deployment: ObjectId,
    pub publisher: Principal,
    pub published_at: DateTime<Utc>,
    /// The definition the type was published with, opaque to the ledger.
    pub definition: serde_json::Value,
}

/// Filter for listing objects. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ObjectFilter {
    pub owner: Option<Principal>,
    pub kind: Option<ObjectKind>,
    pub type_name: Option<String>,
}

impl ObjectFilter {
    pub fn owned_by(owner: &Principal) -> Self {
        Self {
            owner: Some(owner.clone()),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: ObjectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub(crate) fn matches(&self, object: &StoredObject) -> bool {
        self.owner.as_ref().is_none_or(|o| *o == object.owner)
            && self.kind.is_none_or(|k| k == object.kind)
            && self.type_name.as_ref().is_none_or(|n| *n == object.type_name)
    }
}

/// A row the ledger handed out after checking its kind and owner.
///
/// Only [`ObjectStore`](crate::ObjectStore)'s take and borrow paths create
/// one, so typed values cannot be rebuilt from rows read with `get` or
/// `list`.
#[derive(Debug)]
pub struct OwnedObject(StoredObject);

impl OwnedObject {
    pub(crate) fn new(object: StoredObject) -> Self {
        Self(object)
    }

    pub fn object(&self) -> &StoredObject {
        &self.0
    }

    pub fn into_inner(self) -> StoredObject {
        self.0
    }
}

/// A value that can be stored in and taken back out of the ledger.
pub trait LedgerObject: Sized {
    const KIND: ObjectKind;

    /// Turn the value into a row owned by `owner`.
    fn into_stored(self, owner: &Principal) -> Result<StoredObject>;

    /// Rebuild the value from a row handed out to its owner.
    fn from_stored(object: OwnedObject) -> Result<Self>;
}
