//! Display binding: how viewers render a record.

use std::collections::BTreeMap;

use capability::TypeTag;
use chrono::Utc;
use ledger::{LedgerObject, ObjectId, ObjectKind, OwnedObject, Principal, StoredObject};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FieldSchema, Record};

/// Field name → template string, e.g. `image_url → "ipfs://{image_url}"`.
pub type DisplayTemplate = BTreeMap<String, String>;

/// The template every collection gets unless its definition says otherwise.
pub fn standard_template() -> DisplayTemplate {
    [
        ("name", "{name}"),
        ("link", "{link}"),
        ("image_url", "ipfs://{image_url}"),
        ("description", "{description}"),
        ("project_url", "{project_url}"),
        ("creator", "Unknown"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A display template bound to one record type.
///
/// Bound once at initialization; the core never changes the fields after
/// that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayBinding {
    id: ObjectId,
    tag: TypeTag,
    fields: DisplayTemplate,
    version: u16,
}

/// Payload kept in the ledger for a display object.
#[derive(Serialize, Deserialize)]
struct DisplayData {
    fields: DisplayTemplate,
    version: u16,
}

impl DisplayBinding {
    pub(crate) fn new(id: ObjectId, tag: TypeTag, fields: DisplayTemplate) -> Self {
        Self {
            id,
            tag,
            fields,
            version: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn fields(&self) -> &DisplayTemplate {
        &self.fields
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// Rebuild a binding from a row read out of the ledger.
    pub(crate) fn decode(object: StoredObject) -> ledger::Result<Self> {
        let data: DisplayData = serde_json::from_value(object.data)?;
        Ok(Self {
            id: object.id,
            tag: TypeTag {
                name: object.type_name,
                deployment: object.deployment,
            },
            fields: data.fields,
            version: data.version,
        })
    }

    /// Announce the current fields to viewers by bumping the version.
    pub(crate) fn update_version(&mut self) {
        self.version += 1;
        debug!(id = %self.id, version = self.version, "Display version updated");
    }

    /// Render fields of a record with this binding.
    ///
    /// `{field}` placeholders are replaced by the schema's value, `{id}` by
    /// the record id. Unknown or unset fields render as empty text.
    pub fn render<S: FieldSchema>(&self, id: ObjectId, fields: &S) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(key, template)| (key.clone(), fill(template, id, fields)))
            .collect()
    }

    pub fn render_record<S: FieldSchema>(&self, record: &Record<S>) -> BTreeMap<String, String> {
        self.render(record.id(), record.fields())
    }
}

fn fill<S: FieldSchema>(template: &str, id: ObjectId, fields: &S) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // Unterminated placeholder, keep it verbatim.
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        if key == "id" {
            out.push_str(&id.to_string());
        } else {
            out.push_str(fields.field(key).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

impl LedgerObject for DisplayBinding {
    const KIND: ObjectKind = ObjectKind::Display;

    fn into_stored(self, owner: &Principal) -> ledger::Result<StoredObject> {
        Ok(StoredObject {
            id: self.id,
            kind: Self::KIND,
            type_name: self.tag.name,
            deployment: self.tag.deployment,
            owner: owner.clone(),
            data: serde_json::to_value(DisplayData {
                fields: self.fields,
                version: self.version,
            })?,
            updated_at: Utc::now(),
        })
    }

    fn from_stored(object: OwnedObject) -> ledger::Result<Self> {
        Self::decode(object.into_inner())
    }
}
