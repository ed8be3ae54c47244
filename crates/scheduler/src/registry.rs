//! Key registry: the serialization point between tasks sharing a key.
//!
//! A key is present in the registry exactly while one task holding it is
//! executing (or handed to a worker and about to execute). Claims go through
//! a single `entry` call on the map so two racing claimers can never both
//! win the same key.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::task::TaskId;

/// Tracks which keys currently have a task in flight.
///
/// Owned by one scheduler instance; never shared between schedulers.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    occupied: DashMap<String, TaskId>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `key` as occupied by `occupant`. Returns `false` if
    /// another task already holds the key.
    pub fn try_claim(&self, key: &str, occupant: TaskId) -> bool {
        match self.occupied.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(occupant);
                true
            }
        }
    }

    /// Remove `key`. Releasing a key that is not held is a no-op.
    pub fn release(&self, key: &str) -> Option<TaskId> {
        self.occupied.remove(key).map(|(_, occupant)| occupant)
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.occupied.contains_key(key)
    }

    /// Task currently holding `key`, if any.
    pub fn occupant(&self, key: &str) -> Option<TaskId> {
        self.occupied.get(key).map(|entry| *entry.value())
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}

// ── Claims ───────────────────────────────────────────────────

/// Something that frees a key once its task is done.
///
/// Takes `Arc<Self>` so implementations can hand the freed slot to the next
/// task for the same key.
pub(crate) trait KeyRelease: Send + Sync {
    fn release_key(self: Arc<Self>, key: &str);
}

impl KeyRelease for KeyRegistry {
    fn release_key(self: Arc<Self>, key: &str) {
        self.release(key);
    }
}

/// Guard for a claimed key. The key is released exactly once: explicitly via
/// [`Claim::release`], or on drop (including while unwinding).
pub(crate) struct Claim {
    key: String,
    owner: Option<Arc<dyn KeyRelease>>,
}

impl Claim {
    pub fn new(key: impl Into<String>, owner: Arc<dyn KeyRelease>) -> Self {
        Self {
            key: key.into(),
            owner: Some(owner),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(owner) = self.owner.take() {
            debug!(key = %self.key, "releasing key");
            owner.release_key(&self.key);
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.release_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn claim_then_release() {
        let registry = KeyRegistry::new();
        let id = TaskId::new();

        assert!(registry.try_claim("111", id));
        assert!(registry.is_claimed("111"));
        assert_eq!(registry.occupant("111"), Some(id));
        assert!(!registry.try_claim("111", TaskId::new()), "second claim must fail");

        assert_eq!(registry.release("111"), Some(id));
        assert!(registry.is_empty());
        assert!(registry.try_claim("111", TaskId::new()));
    }

    #[test]
    fn release_is_idempotent() {
        let registry = KeyRegistry::new();
        assert_eq!(registry.release("missing"), None);
        registry.try_claim("a", TaskId::new());
        registry.release("a");
        assert_eq!(registry.release("a"), None);
    }

    #[test]
    fn distinct_keys_are_independent() {
        let registry = KeyRegistry::new();
        assert!(registry.try_claim("111", TaskId::new()));
        assert!(registry.try_claim("222", TaskId::new()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn racing_claimers_get_one_winner() {
        let registry = Arc::new(KeyRegistry::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if registry.try_claim("contended", TaskId::new()) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn claim_guard_releases_on_drop() {
        let registry = Arc::new(KeyRegistry::new());
        registry.try_claim("k", TaskId::new());
        {
            let _claim = Claim::new("k", registry.clone());
        }
        assert!(!registry.is_claimed("k"));
    }

    #[test]
    fn claim_guard_releases_on_panic() {
        let registry = Arc::new(KeyRegistry::new());
        registry.try_claim("k", TaskId::new());
        let owner = registry.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _claim = Claim::new("k", owner);
            panic!("task body failed");
        }));
        assert!(result.is_err());
        assert!(!registry.is_claimed("k"));
    }
}
