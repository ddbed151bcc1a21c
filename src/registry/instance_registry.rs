/// Instance Registry
///
/// De-duplicates shared resources by a caller-computed id. Registering an id
/// returns an [`Instance`] that holds the entry lock, so exactly one caller
/// (the first instance) initialises the value while others wait for it.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

pub struct InstanceRegistry<T: ?Sized> {
    entries: DashMap<u64, Slot<T>>,
}

impl<T: ?Sized> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: ?Sized> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the entry for `id` and lock it
    pub fn register(&self, id: u64) -> Instance<T> {
        // clone the slot out so the map shard is unlocked before blocking
        let slot = self
            .entries
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        Instance::locked(id, slot)
    }

    /// Instance that is not shared with anyone
    pub fn detached(id: u64) -> Instance<T> {
        Instance::locked(id, Arc::new(Mutex::new(None)))
    }

    /// Drop entries whose value is referenced by nobody but the registry.
    /// Returns the number of entries left.
    pub fn garbage_collect(&self) -> usize {
        self.entries.retain(|_, slot| match slot.try_lock() {
            Some(guard) => match &*guard {
                Some(value) => Arc::strong_count(value) > 1,
                None => false,
            },
            // an instance is being initialised
            None => true,
        });
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locked registry entry
pub struct Instance<T: ?Sized> {
    id: u64,
    value: ArcMutexGuard<RawMutex, Option<Arc<T>>>,
    first_instance: bool,
}

impl<T: ?Sized> Instance<T> {
    fn locked(id: u64, slot: Slot<T>) -> Self {
        let value = slot.lock_arc();
        let first_instance = value.is_none();
        Self {
            id,
            value,
            first_instance,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// True if the caller has to initialise the value
    pub fn is_first_instance(&self) -> bool {
        self.first_instance
    }

    pub fn value(&self) -> Option<Arc<T>> {
        self.value.clone()
    }

    pub fn set_value(&mut self, value: Arc<T>) {
        *self.value = Some(value);
    }
}
