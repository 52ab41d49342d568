//! One-time type witness.

use std::marker::PhantomData;

use chrono::Utc;
use ledger::{Event, EventKind, ObjectId, ObjectStore, Principal, TypeEntry};
use tracing::info;

use crate::{AdminCredential, Result, TransferPolicy, TypeTag};

/// Proof that the holder is the original publisher of a record type.
///
/// Issued by the host ledger exactly once per type name, when the type is
/// published, and consumed by value when the admin credential is derived
/// from it. It is neither `Clone` nor constructible outside [`publish`], so
/// initialization cannot be replayed.
///
/// [`publish`]: TypeWitness::publish
#[derive(Debug)]
#[must_use = "a witness that is dropped can never be issued again"]
pub struct TypeWitness<S> {
    tag: TypeTag,
    publisher: Principal,
    policy: TransferPolicy,
    _schema: PhantomData<fn() -> S>,
}

impl<S> TypeWitness<S> {
    /// Publish a record type and receive its witness.
    ///
    /// `definition` is stored alongside the type so the deployment can be
    /// reopened later. Fails with [`ledger::Error::AlreadyPublished`] if the
    /// name is taken in this ledger.
    pub fn publish(
        ledger: &mut impl ObjectStore,
        name: impl Into<String>,
        publisher: &Principal,
        policy: TransferPolicy,
        definition: serde_json::Value,
    ) -> Result<Self> {
        let name = name.into();
        let deployment = ledger.allocate()?;
        let entry = TypeEntry {
            name: name.clone(),
            deployment,
            publisher: publisher.clone(),
            published_at: Utc::now(),
            definition,
        };
        if let Err(e) = ledger.register_type(&entry) {
            ledger.release(deployment)?;
            return Err(e.into());
        }
        ledger.append(&Event::new(
            deployment,
            EventKind::Published {
                name: name.clone(),
                publisher: publisher.clone(),
            },
        ))?;
        info!(%name, %deployment, %publisher, %policy, "Published record type");

        Ok(Self {
            tag: TypeTag { name, deployment },
            publisher: publisher.clone(),
            policy,
            _schema: PhantomData,
        })
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn publisher(&self) -> &Principal {
        &self.publisher
    }

    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    /// Consume the witness, deriving the deployment's admin credential.
    pub fn into_admin(self, id: ObjectId) -> AdminCredential<S> {
        AdminCredential::new(id, self.tag)
    }
}
