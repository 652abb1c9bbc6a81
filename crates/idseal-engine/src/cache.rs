//! Bounded FIFO cache for derived keys
//!
//! Derivation is an authority round-trip plus a pairing-based verification,
//! so repeated decrypts for the same identity within a session reuse the
//! key. Entries are cheap to regenerate, which is why plain FIFO eviction
//! is enough — there is no need for LRU bookkeeping.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use idseal_core::SealResult;
use idseal_crypto::DerivedKey;

/// Default maximum number of cached derived keys
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Thread-safe bounded key cache.
///
/// Keyed by identity plus a short fingerprint of the authority's public
/// parameters, so the same identity string under different underlying
/// master material never resolves to a stale key.
pub struct KeyCache {
    entries: Mutex<VecDeque<(String, DerivedKey)>>,
    capacity: usize,
}

impl KeyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// The fingerprint is fixed-length hex, so leading with it keeps the
    /// composite key unambiguous for any identity string.
    fn compose(identity: &str, fingerprint: &str) -> String {
        format!("{fingerprint}:{identity}")
    }

    pub fn get(&self, identity: &str, fingerprint: &str) -> Option<DerivedKey> {
        let key = Self::compose(identity, fingerprint);
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&self, identity: &str, fingerprint: &str, derived: DerivedKey) {
        let key = Self::compose(identity, fingerprint);
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(k, _)| *k != key);
        entries.push_back((key, derived));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Look up a derived key, running `derive` on a miss.
    ///
    /// The lock is never held across the await: a cancelled derivation
    /// inserts nothing, and two concurrent misses simply derive twice —
    /// harmless, since entries are cheap to regenerate.
    pub async fn get_or_derive<F, Fut>(
        &self,
        identity: &str,
        fingerprint: &str,
        derive: F,
    ) -> SealResult<DerivedKey>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SealResult<DerivedKey>>,
    {
        if let Some(found) = self.get(identity, fingerprint) {
            tracing::debug!(identity, "derived key cache hit");
            return Ok(found);
        }

        let derived = derive().await?;
        self.insert(identity, fingerprint, derived.clone());
        Ok(derived)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Synchronously drop every entry. Each [`DerivedKey`] zeroizes its
    /// material on drop, so after this returns no residual key bytes
    /// remain in the cache.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
