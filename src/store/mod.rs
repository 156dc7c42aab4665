//! Pluggable persistence for associations and response nonces.
//!
//! The engine owns no long-lived state of its own; everything it remembers
//! between requests lives behind these traits. Expiry is lazy: a store may
//! hand back expired records and the engine checks the expiry itself, so an
//! implementation never has to sweep in the background to be correct.

mod memory;

pub use memory::{MemoryAssociationStore, MemoryNonceStore};

use crate::openid::{Association, Nonce};

/// Storage for associations, keyed by handle.
///
/// Implementations must be safe under concurrent callers, but `get` followed
/// by `delete` is not expected to be atomic; the engine tolerates the race.
pub trait AssociationStore: Send + Sync {
    fn put(&self, assoc: Association) -> anyhow::Result<()>;
    fn get(&self, handle: &str) -> anyhow::Result<Option<Association>>;
    fn delete(&self, handle: &str) -> anyhow::Result<()>;
}

/// Storage for response nonces.
pub trait NonceStore: Send + Sync {
    fn put(&self, nonce: Nonce) -> anyhow::Result<()>;

    /// Atomic test-and-remove. At most one caller ever observes `Some` for a
    /// given id; this property is the replay guard of the whole protocol.
    fn get_and_delete(&self, id: &str) -> anyhow::Result<Option<Nonce>>;
}
