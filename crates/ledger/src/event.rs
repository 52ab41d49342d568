//! Event types for the ledger's audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ObjectId, Principal};

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A record type was published and its witness issued.
    Published { name: String, publisher: Principal },
    /// The one-time initializer ran for a deployment.
    Initialized {
        admin: ObjectId,
        display: ObjectId,
        delegates: Vec<ObjectId>,
    },
    /// A record was created.
    Minted { to: Principal },
    /// A record changed hands.
    Transferred { to: Principal },
    /// A record was destroyed.
    Burned,
    /// A delegate credential was issued.
    DelegateIssued { to: Principal },
    /// A credential was relinquished by its holder.
    Retired,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Published { .. } => "published",
            EventKind::Initialized { .. } => "initialized",
            EventKind::Minted { .. } => "minted",
            EventKind::Transferred { .. } => "transferred",
            EventKind::Burned => "burned",
            EventKind::DelegateIssued { .. } => "delegate_issued",
            EventKind::Retired => "retired",
        }
    }
}

/// An event in the ledger log, attached to the object it concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub object_id: ObjectId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(object_id: ObjectId, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}
