//! Transfer policy of a deployment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Who may move a record between owners.
///
/// Chosen once per deployment when the record type is published. The two
/// variants are never mixed: each transfer entry point refuses to run under
/// the other policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPolicy {
    /// The current owner moves the record by handing it over.
    #[default]
    OwnerOnly,
    /// The owner hands the record over and must also present a delegate
    /// credential.
    Delegated,
}

impl TransferPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferPolicy::OwnerOnly => "owner_only",
            TransferPolicy::Delegated => "delegated",
        }
    }

    /// Fail unless this deployment runs under `required`.
    pub fn require(self, required: TransferPolicy) -> Result<()> {
        if self == required {
            Ok(())
        } else {
            Err(Error::NotAuthorized(format!(
                "operation requires the {} transfer policy, deployment uses {}",
                required, self
            )))
        }
    }

    /// Whether delegate credentials exist under this policy.
    pub fn uses_delegates(self) -> bool {
        matches!(self, TransferPolicy::Delegated)
    }
}

impl std::fmt::Display for TransferPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "owner_only" => Ok(TransferPolicy::OwnerOnly),
            "delegated" => Ok(TransferPolicy::Delegated),
            other => Err(Error::Parse(format!("unknown transfer policy '{other}'"))),
        }
    }
}
