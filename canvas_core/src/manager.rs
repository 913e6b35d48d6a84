//! Resource identity cache.
//!
//! A [`ResourceManager`] maps native resource identity to the one live wrapper
//! for it. Entries are weak in both directions: the manager never keeps a
//! wrapper alive, and a wrapper only refers back to its entry through a
//! [`ResourceTracker`].
//!
//! Lookup, insert and invalidation all run under one mutex, and a new wrapper
//! is constructed inside that critical section, so concurrent callers can
//! never observe two live wrappers for the same native resource.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    config::CacheConfig,
    error::ResourceError,
    native::{NativeHandle, ResourceId},
    tracker::{EntryOwner, Registry, ResourceTracker},
    wrapper::{ResourceWrapper, TrackedWrapper},
};

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently in the map, including expired ones.
    pub entries: usize,
    /// Entries whose wrapper is still alive.
    pub live: usize,
    /// Wrappers constructed.
    pub created: u64,
    /// Lookups answered with an existing wrapper.
    pub reused: u64,
    /// Wrappers constructed over an expired or closed entry.
    pub replaced: u64,
    /// Strict creates refused because a live wrapper existed.
    pub rejected: u64,
    /// Expired entries swept.
    pub pruned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// The resource must not have a live wrapper yet.
    Create,
    /// Return the live wrapper if there is one.
    Reuse,
}

enum Lookup<W> {
    Vacant,
    Live(Arc<W>),
    /// Entry exists but its wrapper is dead or closed. A closed wrapper that
    /// was still reachable is carried along so it can be released after the
    /// lock is dropped.
    Stale(Option<Arc<W>>),
}

struct State<W> {
    registry: Registry<W>,
    stats: CacheStats,
    /// Map size at which the next insert sweeps expired entries.
    sweep_at: usize,
}

struct Shared<W: TrackedWrapper> {
    name: &'static str,
    prune_threshold: usize,
    state: Mutex<State<W>>,
}

impl<W: TrackedWrapper> Shared<W> {
    fn lookup(state: &State<W>, id: ResourceId) -> Lookup<W> {
        match state.registry.get(id) {
            None => Lookup::Vacant,
            Some(entry) => match entry.wrapper.upgrade() {
                Some(wrapper) if !wrapper.is_closed() => Lookup::Live(wrapper),
                other => Lookup::Stale(other),
            },
        }
    }
}

impl<W: TrackedWrapper> EntryOwner for Shared<W> {
    fn untrack(&self, id: ResourceId, generation: u64) -> bool {
        let removed = self.state.lock().registry.remove_if_generation(id, generation);
        if removed {
            trace!(manager = self.name, %id, generation, "entry invalidated");
        }
        removed
    }
}

/// Identity cache for one wrapper type.
///
/// Cloning yields another handle to the same cache.
pub struct ResourceManager<W: TrackedWrapper> {
    shared: Arc<Shared<W>>,
}

impl<W: TrackedWrapper> ResourceManager<W> {
    pub fn new(name: &'static str, cfg: &CacheConfig) -> Self {
        ResourceManager {
            shared: Arc::new(Shared {
                name,
                prune_threshold: cfg.prune_threshold,
                state: Mutex::new(State {
                    registry: Registry::new(),
                    stats: CacheStats::default(),
                    sweep_at: cfg.prune_threshold,
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Wraps a native resource that must not already have a live wrapper.
    ///
    /// Fails with `InvalidArgument` for a null handle and `InvalidState` if a
    /// live wrapper exists.
    pub fn create(&self, handle: &NativeHandle<W::Native>) -> Result<Arc<W>, ResourceError> {
        self.acquire(handle, Policy::Create)
    }

    /// Returns the live wrapper for a native resource, creating one if there
    /// is none.
    pub fn get_or_create(&self, handle: &NativeHandle<W::Native>) -> Result<Arc<W>, ResourceError> {
        self.acquire(handle, Policy::Reuse)
    }

    /// Returns the live wrapper for a native resource without creating one.
    pub fn try_get(&self, handle: &NativeHandle<W::Native>) -> Option<Arc<W>> {
        let id = handle.id()?;
        let lookup = Shared::lookup(&self.shared.state.lock(), id);
        match lookup {
            Lookup::Live(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn contains_live(&self, handle: &NativeHandle<W::Native>) -> bool {
        let Some(id) = handle.id() else {
            return false;
        };
        let state = self.shared.state.lock();
        state
            .registry
            .get(id)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Entries in the map, including expired ones not yet replaced.
    pub fn len(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        self.shared.state.lock().registry.live_count()
    }

    /// Drops every expired entry.
    pub fn prune_expired(&self) -> usize {
        let mut state = self.shared.state.lock();
        let pruned = state.registry.prune_expired();
        state.stats.pruned += pruned as u64;
        pruned
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            entries: state.registry.len(),
            live: state.registry.live_count(),
            ..state.stats
        }
    }

    fn acquire(
        &self,
        handle: &NativeHandle<W::Native>,
        policy: Policy,
    ) -> Result<Arc<W>, ResourceError> {
        let resource = handle.require()?;
        let id = ResourceId::of(resource);

        let mut state = self.shared.state.lock();
        let lookup = Shared::lookup(&state, id);
        let discarded = match lookup {
            Lookup::Live(existing) => {
                return match policy {
                    Policy::Reuse => {
                        state.stats.reused += 1;
                        drop(state);
                        trace!(manager = self.shared.name, %id, "wrapper reused");
                        Ok(existing)
                    }
                    Policy::Create => {
                        state.stats.rejected += 1;
                        drop(state);
                        drop(existing);
                        Err(ResourceError::InvalidState)
                    }
                };
            }
            Lookup::Stale(discarded) => Some(discarded),
            Lookup::Vacant => None,
        };
        let replaced = discarded.is_some();

        let generation = state.registry.next_generation();
        let owner = Arc::downgrade(&self.shared) as Weak<dyn EntryOwner>;
        let tracker = ResourceTracker::new(owner, id, generation);
        let wrapper = match W::construct(ResourceWrapper::new(resource.clone(), tracker)) {
            Ok(wrapper) => Arc::new(wrapper),
            Err(e) => {
                drop(state);
                drop(discarded);
                return Err(e);
            }
        };

        if self.shared.prune_threshold > 0 && state.registry.len() >= state.sweep_at {
            let pruned = state.registry.prune_expired();
            state.stats.pruned += pruned as u64;
            // Next sweep once the map has doubled.
            state.sweep_at = (state.registry.len() * 2).max(self.shared.prune_threshold);
            if pruned > 0 {
                debug!(manager = self.shared.name, pruned, "expired entries swept");
            }
        }

        state.registry.insert(id, generation, &wrapper);
        wrapper.base().tracker().attach();
        state.stats.created += 1;
        if replaced {
            state.stats.replaced += 1;
        }
        drop(state);
        drop(discarded);

        debug!(manager = self.shared.name, %id, generation, replaced, "wrapper created");
        Ok(wrapper)
    }
}

impl<W: TrackedWrapper> Clone for ResourceManager<W> {
    fn clone(&self) -> Self {
        ResourceManager {
            shared: self.shared.clone(),
        }
    }
}

impl<W: TrackedWrapper> fmt::Debug for ResourceManager<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("name", &self.shared.name)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal native object.
    struct Blob {
        value: u32,
    }

    struct BlobWrapper {
        base: ResourceWrapper<Blob>,
    }

    impl BlobWrapper {
        fn value(&self) -> Result<u32, ResourceError> {
            self.base.with_resource(|blob| Ok(blob.value))
        }
    }

    impl TrackedWrapper for BlobWrapper {
        type Native = Blob;

        fn construct(base: ResourceWrapper<Blob>) -> Result<Self, ResourceError> {
            if base.resource()?.value == u32::MAX {
                return Err(NativeError::invalid_arg("poisoned blob").into());
            }
            Ok(BlobWrapper { base })
        }

        fn base(&self) -> &ResourceWrapper<Blob> {
            &self.base
        }
    }

    fn manager() -> ResourceManager<BlobWrapper> {
        ResourceManager::new("blobs", &CacheConfig::default())
    }

    fn blob(value: u32) -> NativeHandle<Blob> {
        NativeHandle::new(Arc::new(Blob { value }))
    }

    // =============================================================================
    // RM-001: Identity stability
    // =============================================================================

    #[test]
    fn rm_001_get_or_create_returns_same_wrapper() {
        let mgr = manager();
        let b = blob(1);

        let w1 = mgr.get_or_create(&b).unwrap();
        let w2 = mgr.get_or_create(&b).unwrap();
        assert!(Arc::ptr_eq(&w1, &w2));
        assert_eq!(w1.value().unwrap(), 1);

        let stats = mgr.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.live, 1);
    }

    #[test]
    fn rm_001_distinct_resources_get_distinct_wrappers() {
        let mgr = manager();
        let a = mgr.get_or_create(&blob(1)).unwrap();
        let b = mgr.get_or_create(&blob(1)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(mgr.len(), 2);
    }

    // =============================================================================
    // RM-002: Resurrection after drop
    // =============================================================================

    #[test]
    fn rm_002_dropped_wrapper_is_replaced() {
        let mgr = manager();
        let b = blob(5);

        let w1 = mgr.get_or_create(&b).unwrap();
        let first_generation = w1.base().tracker().generation();
        drop(w1);
        assert!(mgr.is_empty());
        assert!(mgr.try_get(&b).is_none());

        let w2 = mgr.get_or_create(&b).unwrap();
        assert!(w2.base().tracker().generation() > first_generation);
        assert_eq!(w2.value().unwrap(), 5);
        assert!(mgr.contains_live(&b));
    }

    // =============================================================================
    // RM-003: Create strictness
    // =============================================================================

    #[test]
    fn rm_003_create_rejects_live_wrapper() {
        let mgr = manager();
        let b = blob(2);

        let w1 = mgr.create(&b).unwrap();
        assert_eq!(mgr.create(&b).err(), Some(ResourceError::InvalidState));
        let w2 = mgr.get_or_create(&b).unwrap();
        assert!(Arc::ptr_eq(&w1, &w2));
        assert_eq!(mgr.stats().rejected, 1);

        drop(w1);
        drop(w2);
        assert!(mgr.create(&b).is_ok());
    }

    // =============================================================================
    // RM-004: Close semantics
    // =============================================================================

    #[test]
    fn rm_004_close_is_idempotent_and_invalidates_entry() {
        let mgr = manager();
        let b = blob(3);

        let w1 = mgr.get_or_create(&b).unwrap();
        w1.close();
        w1.close();
        assert!(w1.is_closed());
        assert_eq!(w1.value().err(), Some(ResourceError::ResourceClosed));
        assert_eq!(w1.native().err(), Some(ResourceError::ResourceClosed));
        assert!(!mgr.contains_live(&b));

        let w2 = mgr.get_or_create(&b).unwrap();
        assert!(!Arc::ptr_eq(&w1, &w2));
        assert_eq!(w2.value().unwrap(), 3);

        // Dropping the closed wrapper must not evict its replacement.
        drop(w1);
        let w3 = mgr.get_or_create(&b).unwrap();
        assert!(Arc::ptr_eq(&w2, &w3));
    }

    // =============================================================================
    // RM-005: Null rejection
    // =============================================================================

    #[test]
    fn rm_005_null_is_rejected_without_mutation() {
        let mgr = manager();
        let null = NativeHandle::<Blob>::null();

        assert_eq!(mgr.create(&null).err(), Some(ResourceError::InvalidArgument));
        assert_eq!(mgr.get_or_create(&null).err(), Some(ResourceError::InvalidArgument));
        assert!(mgr.try_get(&null).is_none());
        assert_eq!(mgr.stats(), CacheStats::default());
    }

    // =============================================================================
    // RM-006: Construction failures pass through
    // =============================================================================

    #[test]
    fn rm_006_construct_error_is_passed_through() {
        let mgr = manager();
        let b = blob(u32::MAX);

        let err = mgr.get_or_create(&b).err().unwrap();
        assert!(matches!(err, ResourceError::Native(ref e) if e.message == "poisoned blob"));
        assert!(mgr.is_empty());
        assert_eq!(mgr.stats().created, 0);
    }

    // =============================================================================
    // RM-007: Pruning
    // =============================================================================

    #[test]
    fn rm_007_dropped_wrappers_leave_nothing_to_prune() {
        let cfg = CacheConfig {
            prune_threshold: 2,
            ..CacheConfig::default()
        };
        let mgr: ResourceManager<BlobWrapper> = ResourceManager::new("blobs", &cfg);
        let natives: Vec<_> = (0..3).map(blob).collect();

        let held = mgr.get_or_create(&natives[0]).unwrap();
        drop(mgr.get_or_create(&natives[1]).unwrap());
        assert_eq!(mgr.len(), 1);

        // Still below the threshold, so this insert does not sweep.
        let other = mgr.get_or_create(&natives[2]).unwrap();
        assert_eq!(mgr.live_count(), 2);
        assert!(Arc::ptr_eq(&held, &mgr.get_or_create(&natives[0]).unwrap()));
        assert!(Arc::ptr_eq(&other, &mgr.get_or_create(&natives[2]).unwrap()));
        assert_eq!(mgr.prune_expired(), 0);
    }

    /// Records an entry for `handle` whose wrapper is already gone.
    fn plant_expired(mgr: &ResourceManager<BlobWrapper>, handle: &NativeHandle<Blob>) -> u64 {
        let resource = handle.require().unwrap();
        let id = ResourceId::of(resource);
        let mut state = mgr.shared.state.lock();
        let generation = state.registry.next_generation();
        let owner = Arc::downgrade(&mgr.shared) as Weak<dyn EntryOwner>;
        let tracker = ResourceTracker::new(owner, id, generation);
        let wrapper = Arc::new(BlobWrapper {
            base: ResourceWrapper::new(resource.clone(), tracker),
        });
        state.registry.insert(id, generation, &wrapper);
        // Never attached, so dropping it leaves the entry behind.
        drop(wrapper);
        generation
    }

    #[test]
    fn rm_007_sweep_at_threshold_keeps_live_entries() {
        let cfg = CacheConfig {
            prune_threshold: 2,
            ..CacheConfig::default()
        };
        let mgr: ResourceManager<BlobWrapper> = ResourceManager::new("blobs", &cfg);
        let natives: Vec<_> = (0..6).map(blob).collect();

        plant_expired(&mgr, &natives[0]);
        plant_expired(&mgr, &natives[1]);
        assert_eq!(mgr.len(), 2);
        assert_eq!(mgr.live_count(), 0);

        let a = mgr.get_or_create(&natives[2]).unwrap();
        assert_eq!(mgr.stats().pruned, 2);
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.shared.state.lock().sweep_at, 2);

        let b = mgr.get_or_create(&natives[3]).unwrap();
        assert_eq!(mgr.len(), 2);

        // Sweeps with only live entries, then waits for the map to double.
        let c = mgr.get_or_create(&natives[4]).unwrap();
        assert_eq!(mgr.shared.state.lock().sweep_at, 4);
        let d = mgr.get_or_create(&natives[5]).unwrap();
        assert_eq!(mgr.shared.state.lock().sweep_at, 4);

        let stats = mgr.stats();
        assert_eq!(stats.pruned, 2);
        assert_eq!(stats.created, 4);
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.live, 4);
        for (w, n) in [(&a, 2), (&b, 3), (&c, 4), (&d, 5)] {
            assert!(Arc::ptr_eq(w, &mgr.get_or_create(&natives[n]).unwrap()));
        }
    }

    #[test]
    fn rm_007_disabled_threshold_never_sweeps() {
        let cfg = CacheConfig {
            prune_threshold: 0,
            ..CacheConfig::default()
        };
        let mgr: ResourceManager<BlobWrapper> = ResourceManager::new("blobs", &cfg);
        let natives: Vec<_> = (0..3).map(blob).collect();

        plant_expired(&mgr, &natives[0]);
        plant_expired(&mgr, &natives[1]);
        let _w = mgr.get_or_create(&natives[2]).unwrap();

        assert_eq!(mgr.len(), 3);
        assert_eq!(mgr.stats().pruned, 0);
        assert_eq!(mgr.prune_expired(), 2);
        assert_eq!(mgr.len(), 1);
    }

    // =============================================================================
    // RM-008: Expired entry replacement
    // =============================================================================

    #[test]
    fn rm_008_expired_entry_is_overwritten() {
        let mgr = manager();
        let b = blob(4);
        let stale_generation = plant_expired(&mgr, &b);
        assert!(mgr.try_get(&b).is_none());
        assert!(!mgr.contains_live(&b));

        let w = mgr.get_or_create(&b).unwrap();
        assert!(w.base().tracker().generation() > stale_generation);
        assert_eq!(w.value().unwrap(), 4);

        let stats = mgr.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.live, 1);

        drop(w);
        assert!(mgr.is_empty());
    }

    #[test]
    fn manager_outlived_by_wrapper() {
        let b = blob(9);
        let wrapper = {
            let mgr = manager();
            mgr.get_or_create(&b).unwrap()
        };
        assert_eq!(wrapper.value().unwrap(), 9);
        drop(wrapper);
    }

    #[test]
    fn concurrent_get_or_create_yields_one_wrapper() {
        let mgr = manager();
        let b = blob(11);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mgr = mgr.clone();
                let b = b.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    let w = mgr.get_or_create(&b).unwrap();
                    calls.fetch_add(1, Ordering::Relaxed);
                    w
                })
            })
            .collect();

        let wrappers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::Relaxed), 8);
        assert!(wrappers.iter().all(|w| Arc::ptr_eq(w, &wrappers[0])));
        assert_eq!(mgr.stats().created, 1);
    }
}
