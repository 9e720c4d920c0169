use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use shared::domain::{AccountId, CatalogItem, ItemId};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 256;

/// Immutable, ordered view of the catalog at one point in time.
pub type CatalogSnapshot = Arc<Vec<CatalogItem>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    Replaced { generation: u64, item_count: usize },
    Patched { generation: u64, item_id: ItemId },
}

#[derive(Default)]
struct StoreState {
    viewer: Option<AccountId>,
    items: CatalogSnapshot,
    positions: HashMap<ItemId, usize>,
    generation: u64,
    applied_load: u64,
}

impl StoreState {
    fn replace(&mut self, viewer: Option<AccountId>, items: Vec<CatalogItem>) {
        self.positions = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id, index))
            .collect();
        self.viewer = viewer;
        self.items = Arc::new(items);
        self.generation += 1;
    }
}

/// In-memory snapshot of the catalog plus the viewer it was resolved for.
///
/// Only [`CatalogStore::replace_all`] changes membership or order;
/// [`CatalogStore::patch`] rewrites a single item in place. Readers hold
/// `Arc` snapshots, so a write copies the vector when a snapshot is still
/// alive instead of mutating what a reader sees.
pub struct CatalogStore {
    state: RwLock<StoreState>,
    loads_in_flight: AtomicUsize,
    events: broadcast::Sender<CatalogEvent>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            loads_in_flight: AtomicUsize::new(0),
            events,
        }
    }

    /// Swaps the whole collection and the viewer context in one step.
    /// `items` must already carry the liked/owned flags for `viewer`.
    pub fn replace_all(&self, viewer: Option<AccountId>, items: Vec<CatalogItem>) {
        let (generation, item_count) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.replace(viewer, items);
            (state.generation, state.items.len())
        };
        self.announce_replace(generation, item_count);
    }

    /// Like [`Self::replace_all`], but only when no later-started load has
    /// already been applied. Returns whether the collection was replaced.
    pub(crate) fn replace_from_load(
        &self,
        ticket: u64,
        viewer: Option<AccountId>,
        items: Vec<CatalogItem>,
    ) -> bool {
        let (generation, item_count) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if ticket < state.applied_load {
                return false;
            }
            state.applied_load = ticket;
            state.replace(viewer, items);
            (state.generation, state.items.len())
        };
        self.announce_replace(generation, item_count);
        true
    }

    /// Applies `f` to the item with `id`. Returns `false` when the item is
    /// not in the snapshot, which happens when a reload dropped it.
    pub fn patch<F>(&self, id: ItemId, f: F) -> bool
    where
        F: FnOnce(&mut CatalogItem),
    {
        let generation = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let Some(position) = state.positions.get(&id).copied() else {
                debug!(item_id = %id, "catalog: patch target not in snapshot");
                return false;
            };
            let item = &mut Arc::make_mut(&mut state.items)[position];
            f(item);
            item.id = id;
            state.generation += 1;
            state.generation
        };
        let _ = self.events.send(CatalogEvent::Patched {
            generation,
            item_id: id,
        });
        true
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.read(|state| Arc::clone(&state.items))
    }

    pub fn get(&self, id: ItemId) -> Option<CatalogItem> {
        self.read(|state| {
            state
                .positions
                .get(&id)
                .and_then(|position| state.items.get(*position))
                .cloned()
        })
    }

    pub fn viewer(&self) -> Option<AccountId> {
        self.read(|state| state.viewer)
    }

    pub fn generation(&self) -> u64 {
        self.read(|state| state.generation)
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items matching `query`, in snapshot order.
    pub fn search(&self, query: &str) -> Vec<CatalogItem> {
        self.snapshot()
            .iter()
            .filter(|item| item.matches_query(query))
            .cloned()
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight.load(Ordering::Acquire) > 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Marks a load as running until the returned guard is dropped.
    pub(crate) fn begin_load(&self) -> LoadGuard<'_> {
        self.loads_in_flight.fetch_add(1, Ordering::AcqRel);
        LoadGuard { store: self }
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn announce_replace(&self, generation: u64, item_count: usize) {
        debug!(generation, item_count, "catalog: snapshot replaced");
        let _ = self.events.send(CatalogEvent::Replaced {
            generation,
            item_count,
        });
    }
}

pub(crate) struct LoadGuard<'a> {
    store: &'a CatalogStore,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.store.loads_in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
