//! One-time initializer.

use capability::TypeWitness;
use ledger::{Event, EventKind, LedgerObject, ObjectId, ObjectStore, Principal};
use tracing::info;

use crate::lifecycle::release_unused;
use crate::{Collection, CollectionDef, DisplayBinding, Error, FieldSchema, Result};

/// What the initializer stored for a fresh deployment.
///
/// The credentials and the display binding already live in the ledger under
/// the publisher; only their ids are returned.
#[derive(Debug)]
pub struct Genesis<S> {
    pub collection: Collection<S>,
    pub admin: ObjectId,
    pub display: ObjectId,
    pub delegates: Vec<ObjectId>,
    /// Principal that published the type and received the credentials.
    pub publisher: Principal,
}

/// Run the one-time initializer of a published record type.
///
/// Consumes the witness, so it can run at most once per publish. Derives the
/// admin credential, issues the initial delegate credentials, and binds the
/// display template (bumping its version once so viewers pick it up). All of
/// it is handed to the publisher in one atomic write; if that write fails the
/// ids allocated for it are released again.
pub fn initialize<S: FieldSchema>(
    ledger: &mut impl ObjectStore,
    witness: TypeWitness<S>,
) -> Result<Genesis<S>> {
    let entry = ledger.type_entry(&witness.tag().name)?;
    if entry.deployment != witness.tag().deployment {
        return Err(Error::NotAuthorized(format!(
            "witness for {} does not match the published deployment {}",
            witness.tag(),
            entry.deployment
        )));
    }
    let def: CollectionDef = serde_json::from_value(entry.definition)?;
    def.validate()?;

    let mut ids = Vec::with_capacity(def.delegates as usize + 2);
    let genesis = store_genesis(ledger, witness, def, &mut ids);
    if genesis.is_err() {
        release_unused(ledger, &ids);
    }
    genesis
}

fn store_genesis<S: FieldSchema>(
    ledger: &mut impl ObjectStore,
    witness: TypeWitness<S>,
    def: CollectionDef,
    ids: &mut Vec<ObjectId>,
) -> Result<Genesis<S>> {
    let tag = witness.tag().clone();
    let policy = witness.policy();
    let publisher = witness.publisher().clone();

    for _ in 0..def.delegates as usize + 2 {
        ids.push(ledger.allocate()?);
    }
    let (admin_id, display_id, delegate_ids) = (ids[0], ids[1], ids[2..].to_vec());

    let mut display = DisplayBinding::new(display_id, tag.clone(), def.display);
    display.update_version();

    let admin = witness.into_admin(admin_id);
    let mut objects = Vec::with_capacity(ids.len());
    for id in &delegate_ids {
        objects.push(admin.issue_delegate(*id).into_stored(&publisher)?);
    }
    objects.push(admin.into_stored(&publisher)?);
    objects.push(display.into_stored(&publisher)?);

    ledger.commit(
        objects,
        &[Event::new(
            tag.deployment,
            EventKind::Initialized {
                admin: admin_id,
                display: display_id,
                delegates: delegate_ids.clone(),
            },
        )],
    )?;
    info!(
        collection = %tag,
        %publisher,
        %policy,
        delegates = delegate_ids.len(),
        "Initialized collection"
    );

    Ok(Genesis {
        collection: Collection::new(tag, policy),
        admin: admin_id,
        display: display_id,
        delegates: delegate_ids,
        publisher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RefusingLedger;
    use crate::{Metadata, publish};
    use capability::TransferPolicy;
    use ledger::{IdentityAllocator, MemoryLedger, ObjectFilter, ObjectKind};

    #[test]
    fn test_initialize_owner_only() {
        let mut ledger = MemoryLedger::new();
        let alice = Principal::new("alice");
        let witness =
            publish::<Metadata>(&mut ledger, &CollectionDef::new("cats"), &alice).unwrap();
        let genesis = initialize(&mut ledger, witness).unwrap();
        assert!(genesis.delegates.is_empty());

        let display = genesis.collection.display(&ledger).unwrap();
        assert_eq!(display.id(), genesis.display);
        assert_eq!(display.version(), 1);
        assert_eq!(display.fields()["image_url"], "ipfs://{image_url}");

        let admin = ledger.get(genesis.admin).unwrap();
        assert_eq!(admin.kind, ObjectKind::AdminCredential);
        assert_eq!(admin.owner, alice);
        assert_eq!(admin.deployment, genesis.collection.tag().deployment);
    }

    #[test]
    fn test_initialize_issues_delegates_to_publisher() {
        let mut ledger = MemoryLedger::new();
        let alice = Principal::new("alice");
        let def = CollectionDef::new("cats")
            .with_transfer(TransferPolicy::Delegated)
            .with_delegates(2);
        let witness = publish::<Metadata>(&mut ledger, &def, &alice).unwrap();
        let genesis = initialize(&mut ledger, witness).unwrap();
        assert_eq!(genesis.delegates.len(), 2);
        assert_ne!(genesis.delegates[0], genesis.delegates[1]);
        assert_eq!(genesis.collection.policy(), TransferPolicy::Delegated);

        let owned = ledger.list(&ObjectFilter::owned_by(&alice)).unwrap();
        let count = |kind: ObjectKind| owned.iter().filter(|o| o.kind == kind).count();
        assert_eq!(count(ObjectKind::AdminCredential), 1);
        assert_eq!(count(ObjectKind::DelegateCredential), 2);
        assert_eq!(count(ObjectKind::Display), 1);
    }

    #[test]
    fn test_second_publish_yields_no_witness() {
        let mut ledger = MemoryLedger::new();
        let alice = Principal::new("alice");
        let def = CollectionDef::new("cats");
        let witness = publish::<Metadata>(&mut ledger, &def, &alice).unwrap();
        initialize(&mut ledger, witness).unwrap();

        let again = publish::<Metadata>(&mut ledger, &def, &Principal::new("mallory"));
        assert!(matches!(
            again,
            Err(Error::Ledger(ledger::Error::AlreadyPublished(_)))
        ));
    }

    #[test]
    fn test_initialize_records_event() {
        let mut ledger = MemoryLedger::new();
        let witness =
            publish::<Metadata>(&mut ledger, &CollectionDef::new("cats"), &"alice".into()).unwrap();
        let deployment = witness.tag().deployment;
        let genesis = initialize(&mut ledger, witness).unwrap();

        let history = ledger.history(deployment).unwrap();
        let kinds: Vec<_> = history.iter().map(|e| e.kind.name()).collect();
        assert_eq!(kinds, ["published", "initialized"]);
        assert!(matches!(
            &history[1].kind,
            EventKind::Initialized { admin, .. } if *admin == genesis.admin
        ));
    }

    #[test]
    fn test_failed_initialize_releases_its_ids() {
        let mut ledger = RefusingLedger::default();
        let def = CollectionDef::new("cats")
            .with_transfer(TransferPolicy::Delegated)
            .with_delegates(3);
        let witness = publish::<Metadata>(&mut ledger, &def, &"alice".into()).unwrap();
        let before = ledger.allocated.len();

        ledger.refusing = true;
        assert!(initialize(&mut ledger, witness).is_err());

        let unused = &ledger.allocated[before..];
        assert_eq!(unused.len(), 5);
        for id in unused {
            assert!(!ledger.is_live(*id).unwrap());
        }
        assert!(ledger.list(&ObjectFilter::default()).unwrap().is_empty());
    }
}
