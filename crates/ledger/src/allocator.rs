//! Identity allocation.

use crate::{ObjectId, Result};

/// Hands out identifiers that are never reused.
///
/// Uniqueness is the only guarantee: ids carry no ordering. A released id
/// stays retired forever, and releasing it again fails with
/// [`Error::InvalidIdentity`](crate::Error::InvalidIdentity).
pub trait IdentityAllocator {
    /// Allocate a fresh identifier, distinct from every id this allocator
    /// has ever returned.
    fn allocate(&mut self) -> Result<ObjectId>;

    /// Retire an identifier.
    fn release(&mut self, id: ObjectId) -> Result<()>;

    /// Whether `id` was allocated and not yet released.
    fn is_live(&self, id: ObjectId) -> Result<bool>;
}
