//! Collection definitions and deployment handles.

use std::marker::PhantomData;

use capability::{TransferPolicy, TypeTag, TypeWitness};
use ledger::{ObjectFilter, ObjectKind, ObjectStore, Principal, StoredObject};
use serde::{Deserialize, Serialize};

use crate::{DisplayBinding, DisplayTemplate, Error, FieldSchema, Result, standard_template};

/// Everything fixed about a record type at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDef {
    /// Type name, unique within a ledger.
    pub name: String,

    /// Who may move records between owners.
    #[serde(default)]
    pub transfer: TransferPolicy,

    /// Delegate credentials handed to the publisher at initialization.
    #[serde(default)]
    pub delegates: u32,

    /// Display template bound at initialization.
    #[serde(default = "standard_template")]
    pub display: DisplayTemplate,
}

impl CollectionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transfer: TransferPolicy::default(),
            delegates: 0,
            display: standard_template(),
        }
    }

    pub fn with_transfer(mut self, transfer: TransferPolicy) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_delegates(mut self, delegates: u32) -> Self {
        self.delegates = delegates;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.delegates > 0 && !self.transfer.uses_delegates() {
            return Err(Error::InvalidArgument(format!(
                "collection '{}' requests {} delegate credentials but uses the {} transfer policy",
                self.name, self.delegates, self.transfer
            )));
        }
        Ok(())
    }
}

/// Publish a record type, receiving the witness its initializer consumes.
///
/// The host refuses a second publish of the same name, so at most one
/// witness ever exists per type.
pub fn publish<S: FieldSchema>(
    ledger: &mut impl ObjectStore,
    def: &CollectionDef,
    publisher: &Principal,
) -> Result<TypeWitness<S>> {
    def.validate()?;
    let witness = TypeWitness::publish(
        ledger,
        def.name.clone(),
        publisher,
        def.transfer,
        serde_json::to_value(def)?,
    )?;
    Ok(witness)
}

/// Handle to one deployed record type.
///
/// Holds no authority of its own; every mutating operation asks for a
/// credential or an owned record.
#[derive(Debug, Clone)]
pub struct Collection<S> {
    tag: TypeTag,
    policy: TransferPolicy,
    _schema: PhantomData<fn() -> S>,
}

impl<S: FieldSchema> Collection<S> {
    pub(crate) fn new(tag: TypeTag, policy: TransferPolicy) -> Self {
        Self {
            tag,
            policy,
            _schema: PhantomData,
        }
    }

    /// Reopen a previously published collection by name.
    pub fn open(ledger: &impl ObjectStore, name: &str) -> Result<Self> {
        let entry = ledger.type_entry(name)?;
        let def: CollectionDef = serde_json::from_value(entry.definition)?;
        Ok(Self::new(
            TypeTag {
                name: entry.name,
                deployment: entry.deployment,
            },
            def.transfer,
        ))
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.tag.name
    }

    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    /// Records of this collection currently owned by `owner`.
    pub fn holdings(
        &self,
        ledger: &impl ObjectStore,
        owner: &Principal,
    ) -> Result<Vec<StoredObject>> {
        let objects = ledger.list(
            &ObjectFilter::owned_by(owner)
                .kind(ObjectKind::Record)
                .type_name(self.tag.name.clone()),
        )?;
        Ok(objects
            .into_iter()
            .filter(|o| o.deployment == self.tag.deployment)
            .collect())
    }

    /// The display binding stored for this collection at initialization.
    pub fn display(&self, ledger: &impl ObjectStore) -> Result<DisplayBinding> {
        let object = ledger
            .list(
                &ObjectFilter::default()
                    .kind(ObjectKind::Display)
                    .type_name(self.tag.name.clone()),
            )?
            .into_iter()
            .find(|o| o.deployment == self.tag.deployment)
            .ok_or_else(|| ledger::Error::NotFound(format!("display for {}", self.tag)))?;
        Ok(DisplayBinding::decode(object)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_delegates_without_policy() {
        let def = CollectionDef::new("cats").with_delegates(2);
        assert!(matches!(def.validate(), Err(Error::InvalidArgument(_))));

        let def = def.with_transfer(TransferPolicy::Delegated);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        assert!(matches!(
            CollectionDef::new("  ").validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_toml_defaults() {
        let def: CollectionDef = toml::from_str(r#"name = "cats""#).unwrap();
        assert_eq!(def.transfer, TransferPolicy::OwnerOnly);
        assert_eq!(def.delegates, 0);
        assert_eq!(def.display["image_url"], "ipfs://{image_url}");
    }

    #[test]
    fn test_parse_toml_custom_display() {
        let def: CollectionDef = toml::from_str(
            r#"
name = "cats"
transfer = "delegated"
delegates = 1

[display]
name = "Cat: {name}"
"#,
        )
        .unwrap();
        assert_eq!(def.transfer, TransferPolicy::Delegated);
        assert_eq!(def.display.len(), 1);
        assert_eq!(def.display["name"], "Cat: {name}");
    }
}
