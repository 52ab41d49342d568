//! Records and their field schemas.

use capability::TypeTag;
use chrono::Utc;
use ledger::{LedgerObject, ObjectId, ObjectKind, OwnedObject, Principal, StoredObject};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The fields carried by every record of one collection.
///
/// Field values are opaque text. The schema only has to name them so the
/// display binding can substitute them into templates.
pub trait FieldSchema: Clone + Serialize + DeserializeOwned {
    /// Value of the named field, or `None` if the schema has no such field or
    /// it is unset.
    fn field(&self, name: &str) -> Option<&str>;
}

/// The stock collectible schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: image_url.into(),
            description: None,
            project_url: None,
            link: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_project_url(mut self, url: impl Into<String>) -> Self {
        self.project_url = Some(url.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl FieldSchema for Metadata {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "image_url" => Some(&self.image_url),
            "description" => self.description.as_deref(),
            "project_url" => self.project_url.as_deref(),
            "link" => self.link.as_deref(),
            _ => None,
        }
    }
}

/// A uniquely identified, exclusively owned collectible.
///
/// Not `Clone`: holding the value is holding the record. The fields never
/// change after minting; only the owner does, and that lives in the ledger.
#[derive(Debug)]
pub struct Record<S> {
    id: ObjectId,
    tag: TypeTag,
    fields: S,
}

impl<S: FieldSchema> Record<S> {
    pub(crate) fn new(id: ObjectId, tag: TypeTag, fields: S) -> Self {
        Self { id, tag, fields }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The record type this record was minted under.
    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn fields(&self) -> &S {
        &self.fields
    }

    /// Split the record into its parts, ending its existence as a value.
    pub(crate) fn into_parts(self) -> (ObjectId, TypeTag, S) {
        (self.id, self.tag, self.fields)
    }
}

impl<S: FieldSchema> LedgerObject for Record<S> {
    const KIND: ObjectKind = ObjectKind::Record;

    fn into_stored(self, owner: &Principal) -> ledger::Result<StoredObject> {
        let (id, tag, fields) = self.into_parts();
        Ok(StoredObject {
            id,
            kind: Self::KIND,
            type_name: tag.name,
            deployment: tag.deployment,
            owner: owner.clone(),
            data: serde_json::to_value(fields)?,
            updated_at: Utc::now(),
        })
    }

    fn from_stored(object: OwnedObject) -> ledger::Result<Self> {
        let object = object.into_inner();
        Ok(Self {
            id: object.id,
            tag: TypeTag {
                name: object.type_name,
                deployment: object.deployment,
            },
            fields: serde_json::from_value(object.data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{IdentityAllocator, MemoryLedger, ObjectStore};

    #[test]
    fn test_metadata_fields() {
        let meta = Metadata::new("Tom", "Qm123").with_link("https://example.com/tom");
        assert_eq!(meta.field("name"), Some("Tom"));
        assert_eq!(meta.field("image_url"), Some("Qm123"));
        assert_eq!(meta.field("link"), Some("https://example.com/tom"));
        assert_eq!(meta.field("description"), None);
        assert_eq!(meta.field("creator"), None);
    }

    #[test]
    fn test_optional_fields_omitted_from_payload() {
        let meta = Metadata::new("Tom", "Qm123");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, serde_json::json!({ "name": "Tom", "image_url": "Qm123" }));
    }

    #[test]
    fn test_stored_record_keeps_identity_and_fields() {
        let mut ledger = MemoryLedger::new();
        let tag = TypeTag {
            name: "cats".to_string(),
            deployment: ledger.allocate().unwrap(),
        };
        let id = ledger.allocate().unwrap();
        let record = Record::new(id, tag.clone(), Metadata::new("Tom", "Qm123"));
        ledger.transfer_object(record, &"alice".into()).unwrap();

        let stored = ledger.get(id).unwrap();
        assert_eq!(stored.kind, ObjectKind::Record);
        assert_eq!(stored.owner.as_str(), "alice");

        let back: Record<Metadata> = ledger.take_object(id, &"alice".into()).unwrap();
        assert_eq!(back.id(), id);
        assert_eq!(back.tag(), &tag);
        assert_eq!(back.fields().name, "Tom");
    }
}
