//! Cache entries and the wrapper-side back reference to them.
//!
//! A [`ResourceTracker`] is owned by a wrapper and points (weakly) back at the
//! registry that recorded it. It never keeps the registry alive, and the
//! registry never keeps the wrapper alive.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use crate::native::ResourceId;

/// Something that can drop the entry a tracker refers to.
pub(crate) trait EntryOwner: Send + Sync {
    /// Removes the entry for `id` if it still has `generation`.
    fn untrack(&self, id: ResourceId, generation: u64) -> bool;
}

/// Map slot: weak reference from a native identity to its current wrapper.
pub(crate) struct CacheEntry<W> {
    pub generation: u64,
    pub wrapper: Weak<W>,
}

impl<W> CacheEntry<W> {
    pub fn is_expired(&self) -> bool {
        self.wrapper.strong_count() == 0
    }
}

/// Identity map guarded by the owning manager's mutex.
pub(crate) struct Registry<W> {
    entries: HashMap<ResourceId, CacheEntry<W>>,
    next_generation: u64,
}

impl<W> Registry<W> {
    pub fn new() -> Self {
        Registry {
            entries: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&CacheEntry<W>> {
        self.entries.get(&id)
    }

    /// Reserves the generation for the next inserted entry.
    pub fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Inserts or overwrites the entry for `id`, returning the previous one.
    pub fn insert(&mut self, id: ResourceId, generation: u64, wrapper: &Arc<W>) -> Option<CacheEntry<W>> {
        self.entries.insert(
            id,
            CacheEntry {
                generation,
                wrapper: Arc::downgrade(wrapper),
            },
        )
    }

    pub fn remove_if_generation(&mut self, id: ResourceId, generation: u64) -> bool {
        match self.entries.get(&id) {
            Some(entry) if entry.generation == generation => {
                self.entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_expired()).count()
    }
}

/// Wrapper-side back reference to its cache entry.
///
/// A tracker starts detached; the manager attaches it once the entry is
/// recorded. Detaching is one-shot, so `close` followed by drop only touches
/// the registry once.
pub struct ResourceTracker {
    owner: Weak<dyn EntryOwner>,
    id: ResourceId,
    generation: u64,
    attached: AtomicBool,
}

impl ResourceTracker {
    pub(crate) fn new(owner: Weak<dyn EntryOwner>, id: ResourceId, generation: u64) -> Self {
        ResourceTracker {
            owner,
            id,
            generation,
            attached: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Invalidates the entry this tracker refers to, if it is still ours.
    pub(crate) fn detach(&self) -> bool {
        if !self.attached.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.owner.upgrade() {
            Some(owner) => owner.untrack(self.id, self.generation),
            None => false,
        }
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("attached", &self.is_attached())
            .finish()
    }
}
