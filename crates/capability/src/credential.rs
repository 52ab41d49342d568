//! Credentials and the tags that bind them to a record type.

use std::marker::PhantomData;

use chrono::Utc;
use ledger::{
    LedgerObject, ObjectId, ObjectKind, ObjectStore, OwnedObject, Principal, StoredObject,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Identity of one published record type in one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag {
    pub name: String,
    pub deployment: ObjectId,
}

impl TypeTag {
    fn describes(&self, object: &StoredObject) -> bool {
        object.type_name == self.name && object.deployment == self.deployment
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.deployment)
    }
}

/// A possession-based capability.
///
/// Holding a credential the ledger still stores, with a tag that matches the
/// record type, is the whole authorization check. There are no roles and no
/// per-object lists.
pub trait Credential: LedgerObject {
    /// Human-readable credential name, used in errors and logs.
    const NAME: &'static str;

    fn id(&self) -> ObjectId;

    fn tag(&self) -> &TypeTag;

    /// Check that this credential belongs to `expected` and is held in the
    /// ledger.
    ///
    /// The ledger must store a live object under the credential's id, of the
    /// credential's kind and tag. A value that was taken out, retired or never
    /// stored authorizes nothing.
    fn authorize(&self, expected: &TypeTag, ledger: &impl ObjectStore) -> Result<()> {
        if self.tag() != expected {
            warn!(
                credential = Self::NAME,
                presented = %self.tag(),
                expected = %expected,
                "Rejected credential for another record type"
            );
            return Err(Error::NotAuthorized(format!(
                "{} {} belongs to {}, not {}",
                Self::NAME,
                self.id(),
                self.tag(),
                expected
            )));
        }

        let stored = match ledger.get(self.id()) {
            Ok(object) => object.kind == Self::KIND && expected.describes(&object),
            Err(ledger::Error::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if !stored || !ledger.is_live(self.id())? {
            warn!(
                credential = Self::NAME,
                id = %self.id(),
                "Rejected credential not held in the ledger"
            );
            return Err(Error::NotAuthorized(format!(
                "{} {} is not held in the ledger",
                Self::NAME,
                self.id()
            )));
        }
        Ok(())
    }
}

/// The singleton administrative credential of a deployment.
///
/// Derived once from the [`TypeWitness`](crate::TypeWitness). Gates minting
/// and the issuing of delegate credentials.
#[derive(Debug)]
pub struct AdminCredential<S> {
    id: ObjectId,
    tag: TypeTag,
    _schema: PhantomData<fn() -> S>,
}

impl<S> AdminCredential<S> {
    pub(crate) fn new(id: ObjectId, tag: TypeTag) -> Self {
        Self {
            id,
            tag,
            _schema: PhantomData,
        }
    }

    /// Create a delegate credential for the same record type.
    ///
    /// The delegate authorizes nothing until it is stored in the ledger. The
    /// caller is responsible for checking that the deployment uses the
    /// delegated transfer policy and that `id` is freshly allocated.
    pub fn issue_delegate(&self, id: ObjectId) -> DelegateCredential<S> {
        DelegateCredential {
            id,
            tag: self.tag.clone(),
            _schema: PhantomData,
        }
    }
}

impl<S> Credential for AdminCredential<S> {
    const NAME: &'static str = "admin credential";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn tag(&self) -> &TypeTag {
        &self.tag
    }
}

/// A transferable credential that authorizes moving records between owners.
#[derive(Debug)]
pub struct DelegateCredential<S> {
    id: ObjectId,
    tag: TypeTag,
    _schema: PhantomData<fn() -> S>,
}

impl<S> Credential for DelegateCredential<S> {
    const NAME: &'static str = "delegate credential";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn tag(&self) -> &TypeTag {
        &self.tag
    }
}

fn store_credential(
    kind: ObjectKind,
    id: ObjectId,
    tag: TypeTag,
    owner: &Principal,
) -> StoredObject {
    StoredObject {
        id,
        kind,
        type_name: tag.name,
        deployment: tag.deployment,
        owner: owner.clone(),
        data: serde_json::Value::Null,
        updated_at: Utc::now(),
    }
}

fn stored_tag(object: OwnedObject) -> (ObjectId, TypeTag) {
    let object = object.into_inner();
    (
        object.id,
        TypeTag {
            name: object.type_name,
            deployment: object.deployment,
        },
    )
}

impl<S> LedgerObject for AdminCredential<S> {
    const KIND: ObjectKind = ObjectKind::AdminCredential;

    fn into_stored(self, owner: &Principal) -> ledger::Result<StoredObject> {
        Ok(store_credential(Self::KIND, self.id, self.tag, owner))
    }

    fn from_stored(object: OwnedObject) -> ledger::Result<Self> {
        let (id, tag) = stored_tag(object);
        Ok(Self::new(id, tag))
    }
}

impl<S> LedgerObject for DelegateCredential<S> {
    const KIND: ObjectKind = ObjectKind::DelegateCredential;

    fn into_stored(self, owner: &Principal) -> ledger::Result<StoredObject> {
        Ok(store_credential(Self::KIND, self.id, self.tag, owner))
    }

    fn from_stored(object: OwnedObject) -> ledger::Result<Self> {
        let (id, tag) = stored_tag(object);
        Ok(Self {
            id,
            tag,
            _schema: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransferPolicy, TypeWitness};
    use ledger::{IdentityAllocator, MemoryLedger};

    fn alice() -> Principal {
        Principal::new("alice")
    }

    /// Publish `name` and store its admin credential under alice.
    fn stored_admin(ledger: &mut MemoryLedger, name: &str) -> (ObjectId, TypeTag) {
        let witness = TypeWitness::<()>::publish(
            ledger,
            name,
            &alice(),
            TransferPolicy::Delegated,
            serde_json::Value::Null,
        )
        .unwrap();
        let tag = witness.tag().clone();
        let id = ledger.allocate().unwrap();
        ledger.transfer_object(witness.into_admin(id), &alice()).unwrap();
        (id, tag)
    }

    fn authorize_admin(ledger: &mut MemoryLedger, id: ObjectId, tag: &TypeTag) -> Result<()> {
        ledger.borrow_object(id, &alice(), |ledger, admin: &AdminCredential<()>| {
            admin.authorize(tag, &*ledger)
        })
    }

    #[test]
    fn test_authorize_matching_tag() {
        let mut ledger = MemoryLedger::new();
        let (id, tag) = stored_admin(&mut ledger, "cats");
        assert!(authorize_admin(&mut ledger, id, &tag).is_ok());
    }

    #[test]
    fn test_authorize_rejects_other_deployment() {
        let mut ledger = MemoryLedger::new();
        let (cats, cats_tag) = stored_admin(&mut ledger, "cats");
        let (_, dogs_tag) = stored_admin(&mut ledger, "dogs");
        assert!(matches!(
            authorize_admin(&mut ledger, cats, &dogs_tag),
            Err(Error::NotAuthorized(_))
        ));

        // Same name in a separate ledger is a different deployment.
        let mut other = MemoryLedger::new();
        let (foreign, _) = stored_admin(&mut other, "cats");
        let result = other.borrow_object(foreign, &alice(), |_, admin: &AdminCredential<()>| {
            admin.authorize(&cats_tag, &ledger)
        });
        assert!(matches!(result, Err(Error::NotAuthorized(_))));
    }

    #[test]
    fn test_authorize_rejects_credential_not_in_ledger() {
        let mut ledger = MemoryLedger::new();
        let (_, tag) = stored_admin(&mut ledger, "cats");

        // A live id with a copied tag but nothing stored behind it.
        let forged = AdminCredential::<()>::new(ledger.allocate().unwrap(), tag.clone());
        assert!(matches!(
            forged.authorize(&tag, &ledger),
            Err(Error::NotAuthorized(_))
        ));

        // A row of another kind under the same tag does not count either.
        let display_id = ledger.allocate().unwrap();
        ledger
            .commit(
                vec![StoredObject {
                    id: display_id,
                    kind: ObjectKind::Display,
                    type_name: tag.name.clone(),
                    deployment: tag.deployment,
                    owner: alice(),
                    data: serde_json::Value::Null,
                    updated_at: Utc::now(),
                }],
                &[],
            )
            .unwrap();
        let forged = AdminCredential::<()>::new(display_id, tag.clone());
        assert!(matches!(
            forged.authorize(&tag, &ledger),
            Err(Error::NotAuthorized(_))
        ));
    }

    #[test]
    fn test_taken_credential_authorizes_nothing() {
        let mut ledger = MemoryLedger::new();
        let (id, tag) = stored_admin(&mut ledger, "cats");

        let admin: AdminCredential<()> = ledger.take_object(id, &alice()).unwrap();
        assert!(matches!(
            admin.authorize(&tag, &ledger),
            Err(Error::NotAuthorized(_))
        ));

        ledger.transfer_object(admin, &alice()).unwrap();
        assert!(authorize_admin(&mut ledger, id, &tag).is_ok());
    }

    #[test]
    fn test_authorize_rejects_retired_credential() {
        let mut ledger = MemoryLedger::new();
        let (admin_id, tag) = stored_admin(&mut ledger, "cats");
        let delegate_id = ledger
            .borrow_object(admin_id, &alice(), |ledger, admin: &AdminCredential<()>| {
                let id = ledger.allocate()?;
                ledger.transfer_object(admin.issue_delegate(id), &alice())?;
                Ok::<_, Error>(id)
            })
            .unwrap();

        let check = |ledger: &mut MemoryLedger| {
            ledger.borrow_object(
                delegate_id,
                &alice(),
                |ledger, delegate: &DelegateCredential<()>| delegate.authorize(&tag, &*ledger),
            )
        };
        assert!(check(&mut ledger).is_ok());

        ledger.release(delegate_id).unwrap();
        assert!(matches!(check(&mut ledger), Err(Error::NotAuthorized(_))));
    }

    #[test]
    fn test_stored_credential_keeps_tag() {
        let mut ledger = MemoryLedger::new();
        let (id, tag) = stored_admin(&mut ledger, "cats");

        let back: AdminCredential<()> = ledger.take_object(id, &alice()).unwrap();
        assert_eq!(back.tag(), &tag);
        assert!(matches!(
            ledger.take_object::<DelegateCredential<()>>(id, &alice()),
            Err(ledger::Error::NotFound(_))
        ));
    }
}
