//! In-memory store implementations.
//!
//! A single mutex around a `HashMap` is plenty here: every operation is a
//! key lookup and the maps stay small next to the traffic they serve.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use super::{AssociationStore, NonceStore};
use crate::openid::{Association, Nonce};

#[derive(Debug, Default)]
pub struct MemoryAssociationStore {
    inner: Mutex<HashMap<String, Association>>,
}

impl MemoryAssociationStore {
    pub fn new() -> MemoryAssociationStore {
        MemoryAssociationStore::default()
    }

    /// Drop every expired association. Optional housekeeping; the engine
    /// deletes expired records as it meets them either way.
    pub fn remove_expired(&self) {
        let now = Utc::now();
        self.inner.lock().retain(|_, assoc| !assoc.is_expired(now));
    }
}

impl AssociationStore for MemoryAssociationStore {
    fn put(&self, assoc: Association) -> anyhow::Result<()> {
        let _ = self.inner.lock().insert(assoc.handle.clone(), assoc);
        Ok(())
    }

    fn get(&self, handle: &str) -> anyhow::Result<Option<Association>> {
        Ok(self.inner.lock().get(handle).cloned())
    }

    fn delete(&self, handle: &str) -> anyhow::Result<()> {
        let _ = self.inner.lock().remove(handle);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    inner: Mutex<HashMap<String, Nonce>>,
}

impl MemoryNonceStore {
    pub fn new() -> MemoryNonceStore {
        MemoryNonceStore::default()
    }

    /// Drop every expired nonce.
    pub fn remove_expired(&self) {
        let now = Utc::now();
        self.inner.lock().retain(|_, nonce| !nonce.is_expired(now));
    }
}

impl NonceStore for MemoryNonceStore {
    fn put(&self, nonce: Nonce) -> anyhow::Result<()> {
        let _ = self.inner.lock().insert(nonce.id.clone(), nonce);
        Ok(())
    }

    fn get_and_delete(&self, id: &str) -> anyhow::Result<Option<Nonce>> {
        // The lock spans lookup and removal, so only one caller can win.
        Ok(self.inner.lock().remove(id))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::openid::AssocType;

    #[test]
    fn association_put_get_delete() -> anyhow::Result<()> {
        let store = MemoryAssociationStore::new();
        let assoc = Association::generate(AssocType::HmacSha256, Duration::seconds(30), false);
        let handle = assoc.handle.clone();

        store.put(assoc)?;
        assert!(store.get(&handle)?.is_some());
        assert!(store.get("unknown")?.is_none());

        store.delete(&handle)?;
        assert!(store.get(&handle)?.is_none());
        Ok(())
    }

    #[test]
    fn expired_associations_are_returned_until_swept() -> anyhow::Result<()> {
        let store = MemoryAssociationStore::new();
        let mut assoc = Association::generate(AssocType::HmacSha1, Duration::seconds(30), false);
        assoc.expiry = Utc::now() - Duration::seconds(1);
        let handle = assoc.handle.clone();

        store.put(assoc)?;
        // lazy expiry: the store hands the record back as-is
        assert!(store.get(&handle)?.is_some());

        store.remove_expired();
        assert!(store.get(&handle)?.is_none());
        Ok(())
    }

    #[test]
    fn nonce_is_consumed_exactly_once() -> anyhow::Result<()> {
        let store = MemoryNonceStore::new();
        store.put(Nonce {
            id: "2023-09-15T11:23:46Zdeadbeef".to_string(),
            expiry: Utc::now() + Duration::seconds(30),
        })?;

        assert!(store.get_and_delete("2023-09-15T11:23:46Zdeadbeef")?.is_some());
        assert!(store.get_and_delete("2023-09-15T11:23:46Zdeadbeef")?.is_none());
        Ok(())
    }

    #[test]
    fn concurrent_consumers_see_a_single_winner() -> anyhow::Result<()> {
        let store = Arc::new(MemoryNonceStore::new());
        store.put(Nonce {
            id: "2023-09-15T11:23:46Zcafe0001".to_string(),
            expiry: Utc::now() + Duration::seconds(30),
        })?;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .get_and_delete("2023-09-15T11:23:46Zcafe0001")
                        .map(|nonce| nonce.is_some())
                        .unwrap_or(false)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        Ok(())
    }
}
