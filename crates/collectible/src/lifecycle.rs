//! Record lifecycle: mint, transfer, burn.

use capability::{AdminCredential, Credential, DelegateCredential, TransferPolicy};
use ledger::{Event, EventKind, LedgerObject, ObjectId, ObjectStore, Principal};
use tracing::{info, warn};

use crate::{Collection, Error, FieldSchema, Record, Result};

impl<S: FieldSchema> Collection<S> {
    /// Mint `count` records with identical fields, all owned by `recipient`.
    ///
    /// Every precondition is checked before anything is allocated; the batch
    /// is then written in one atomic commit, so either all records exist
    /// afterwards or none do. Ids allocated for a batch that fails to commit
    /// are released.
    pub fn mint(
        &self,
        ledger: &mut impl ObjectStore,
        admin: &AdminCredential<S>,
        count: usize,
        fields: S,
        recipient: &Principal,
    ) -> Result<Vec<ObjectId>> {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "mint count must be greater than zero".to_string(),
            ));
        }
        admin.authorize(self.tag(), &*ledger)?;

        let mut ids = Vec::with_capacity(count);
        if let Err(e) = self.write_batch(ledger, &mut ids, count, &fields, recipient) {
            release_unused(ledger, &ids);
            return Err(e);
        }

        info!(collection = %self.tag(), count, %recipient, "Minted records");
        Ok(ids)
    }

    /// Move a record to `recipient` under the delegated transfer policy.
    ///
    /// The record value proves the caller held it; the delegate credential
    /// proves the move is sanctioned.
    pub fn transfer(
        &self,
        ledger: &mut impl ObjectStore,
        delegate: &DelegateCredential<S>,
        record: Record<S>,
        recipient: &Principal,
    ) -> Result<()> {
        self.policy().require(TransferPolicy::Delegated)?;
        delegate.authorize(self.tag(), &*ledger)?;
        self.hand_over(ledger, record, recipient)
    }

    /// Move a record to `recipient` under the owner-only transfer policy.
    ///
    /// Only the current owner can take the record out of the ledger, so
    /// holding the taken value is the whole check.
    pub fn transfer_owned(
        &self,
        ledger: &mut impl ObjectStore,
        record: Record<S>,
        recipient: &Principal,
    ) -> Result<()> {
        self.policy().require(TransferPolicy::OwnerOnly)?;
        self.hand_over(ledger, record, recipient)
    }

    /// Destroy a record for good. Its identity is never handed out again.
    pub fn burn(&self, ledger: &mut impl ObjectStore, record: Record<S>) -> Result<()> {
        self.check_record(&record)?;
        ensure_taken(ledger, record.id())?;
        let (id, _, _) = record.into_parts();
        ledger.destroy(id, &[Event::new(id, EventKind::Burned)])?;
        info!(collection = %self.tag(), %id, "Burned record");
        Ok(())
    }

    /// Issue a new delegate credential to `recipient`.
    pub fn issue_delegate(
        &self,
        ledger: &mut impl ObjectStore,
        admin: &AdminCredential<S>,
        recipient: &Principal,
    ) -> Result<ObjectId> {
        self.policy().require(TransferPolicy::Delegated)?;
        admin.authorize(self.tag(), &*ledger)?;

        let id = ledger.allocate()?;
        let delegate = admin.issue_delegate(id);
        let stored = delegate.into_stored(recipient)?;
        let committed = ledger.commit(
            vec![stored],
            &[Event::new(id, EventKind::DelegateIssued { to: recipient.clone() })],
        );
        if let Err(e) = committed {
            release_unused(ledger, &[id]);
            return Err(e.into());
        }
        info!(collection = %self.tag(), %id, %recipient, "Issued delegate credential");
        Ok(id)
    }

    /// Relinquish a credential taken out of the ledger. Its identity is
    /// released, so it can never be stored or presented again.
    pub fn retire<C: Credential>(
        &self,
        ledger: &mut impl ObjectStore,
        credential: C,
    ) -> Result<()> {
        if credential.tag() != self.tag() {
            return Err(Error::NotAuthorized(format!(
                "{} {} belongs to {}",
                C::NAME,
                credential.id(),
                credential.tag()
            )));
        }
        let id = credential.id();
        ensure_taken(ledger, id)?;
        ledger.destroy(id, &[Event::new(id, EventKind::Retired)])?;
        info!(collection = %self.tag(), %id, credential = C::NAME, "Retired credential");
        Ok(())
    }

    fn write_batch(
        &self,
        ledger: &mut impl ObjectStore,
        ids: &mut Vec<ObjectId>,
        count: usize,
        fields: &S,
        recipient: &Principal,
    ) -> Result<()> {
        let mut objects = Vec::with_capacity(count);
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let id = ledger.allocate()?;
            ids.push(id);
            let record = Record::new(id, self.tag().clone(), fields.clone());
            objects.push(record.into_stored(recipient)?);
            events.push(Event::new(id, EventKind::Minted { to: recipient.clone() }));
        }
        ledger.commit(objects, &events)?;
        Ok(())
    }

    fn hand_over(
        &self,
        ledger: &mut impl ObjectStore,
        record: Record<S>,
        recipient: &Principal,
    ) -> Result<()> {
        self.check_record(&record)?;
        let id = record.id();
        ensure_taken(ledger, id)?;
        ledger.commit(
            vec![record.into_stored(recipient)?],
            &[Event::new(id, EventKind::Transferred { to: recipient.clone() })],
        )?;
        info!(collection = %self.tag(), %id, %recipient, "Transferred record");
        Ok(())
    }

    fn check_record(&self, record: &Record<S>) -> Result<()> {
        if record.tag() != self.tag() {
            warn!(
                collection = %self.tag(),
                record = %record.id(),
                belongs_to = %record.tag(),
                "Rejected record from another collection"
            );
            return Err(Error::NotAuthorized(format!(
                "record {} belongs to {}, not {}",
                record.id(),
                record.tag(),
                self.tag()
            )));
        }
        Ok(())
    }
}

/// A value may only be moved or destroyed after its owner took it out.
///
/// A row still stored under the id means the value in hand is a copy, not
/// the object itself.
fn ensure_taken(ledger: &impl ObjectStore, id: ObjectId) -> Result<()> {
    match ledger.get(id) {
        Ok(stored) => {
            warn!(%id, owner = %stored.owner, "Rejected value that is still stored");
            Err(Error::NotAuthorized(format!(
                "object {id} is still held by {}",
                stored.owner
            )))
        }
        Err(ledger::Error::NotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Release ids allocated for a write that never happened.
pub(crate) fn release_unused(ledger: &mut impl ObjectStore, ids: &[ObjectId]) {
    for id in ids {
        if let Err(e) = ledger.release(*id) {
            warn!(%id, error = %e, "Could not release unused identity");
        }
    }
}
