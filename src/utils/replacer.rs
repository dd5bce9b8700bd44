use std::hash::Hash;

use hashlink::{LinkedHashMap, LinkedHashSet};
use parking_lot::Mutex;

/// Frame-replacement policy used by the buffer pool.
///
/// A replacer only tracks which ids are evictable; it knows nothing about
/// pages or disks. Implementations are internally synchronized, so every
/// method takes `&self`.
pub trait Replacer<ID: Eq + Hash + Copy>: Send + Sync {
    /// Removes and returns the id that should be evicted next.
    fn victim(&self) -> Option<ID>;

    /// The id `victim` would return, left in place.
    fn peek_victim(&self) -> Option<ID>;

    /// The id has outstanding users and must not be evicted.
    fn pin(&self, entry_id: ID);

    /// The id has no users left and may be evicted.
    fn unpin(&self, entry_id: ID);

    /// Forgets the id entirely, including any history kept for it.
    fn remove(&self, entry_id: ID);

    /// Whether the id is currently a candidate for eviction.
    fn is_evictable(&self, entry_id: ID) -> bool;

    /// Number of evictable ids.
    fn size(&self) -> usize;
}

/// Least-recently-unpinned replacement.
///
/// Ids sit in insertion order: the oldest unpin is at the front and is the
/// next victim. Unpinning an id that is already tracked leaves it where it
/// is; only a pin followed by a new unpin moves it to the back.
pub struct LRUReplacer<ID: Eq + Hash + Copy> {
    cache: Mutex<LinkedHashSet<ID>>,
    capacity: usize,
}

impl<ID: Eq + Hash + Copy> LRUReplacer<ID> {
    pub fn new(capacity: usize) -> Self {
        LRUReplacer {
            cache: Mutex::new(LinkedHashSet::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<ID: Eq + Hash + Copy + Send> Replacer<ID> for LRUReplacer<ID> {
    fn victim(&self) -> Option<ID> {
        self.cache.lock().pop_front()
    }

    fn peek_victim(&self) -> Option<ID> {
        self.cache.lock().front().copied()
    }

    fn pin(&self, entry_id: ID) {
        self.cache.lock().remove(&entry_id);
    }

    fn unpin(&self, entry_id: ID) {
        let mut cache = self.cache.lock();

        // LinkedHashSet::insert would move an existing entry to the back
        if !cache.contains(&entry_id) {
            cache.insert(entry_id);
        }
    }

    fn remove(&self, entry_id: ID) {
        self.pin(entry_id);
    }

    fn is_evictable(&self, entry_id: ID) -> bool {
        self.cache.lock().contains(&entry_id)
    }

    fn size(&self) -> usize {
        self.cache.lock().len()
    }
}

#[derive(Debug)]
struct LRUKNode {
    // Most recent access first, at most k entries
    history: Vec<usize>,
    is_evictable: bool,
    k: usize,
}

impl LRUKNode {
    fn new(k: usize) -> Self {
        LRUKNode {
            history: Vec::with_capacity(k),
            is_evictable: false,
            k,
        }
    }

    fn push_timestamp(&mut self, timestamp: usize) {
        self.history.insert(0, timestamp);
        self.history.truncate(self.k);
    }

    fn get_kth_entry(&self) -> Option<usize> {
        self.history.get(self.k - 1).copied()
    }

    fn get_last_entry(&self) -> usize {
        self.history.last().copied().unwrap_or(0)
    }
}

struct LRUKState<ID: Eq + Hash + Copy> {
    node_store: LinkedHashMap<ID, LRUKNode>,
    current_timestamp: usize,
    evictable_size: usize,
}

impl<ID: Eq + Hash + Copy> LRUKState<ID> {
    fn record_access(&mut self, entry_id: ID, k: usize) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        self.node_store
            .entry(entry_id)
            .or_insert_with(|| LRUKNode::new(k))
            .push_timestamp(timestamp);
    }

    fn find_victim(&self) -> Option<ID> {
        if self.evictable_size == 0 {
            return None;
        }

        // Best +inf candidate by oldest access, best finite one by distance
        let mut infinite: Option<(ID, usize)> = None;
        let mut finite: Option<(ID, usize)> = None;

        for (id, node) in self.node_store.iter().filter(|(_, node)| node.is_evictable) {
            match node.get_kth_entry() {
                None => {
                    let oldest = node.get_last_entry();
                    if infinite.map_or(true, |(_, best)| oldest < best) {
                        infinite = Some((*id, oldest));
                    }
                }
                Some(kth) => {
                    let distance = self.current_timestamp - kth;
                    if finite.map_or(true, |(_, best)| distance > best) {
                        finite = Some((*id, distance));
                    }
                }
            }
        }

        infinite.or(finite).map(|(id, _)| id)
    }
}

/// LRU-K replacement.
///
/// Every pin counts as an access. The victim is the evictable id whose k-th
/// most recent access is oldest; ids with fewer than k accesses have an
/// infinite backward distance and go first, oldest recorded access first.
pub struct LRUKReplacer<ID: Eq + Hash + Copy> {
    state: Mutex<LRUKState<ID>>,
    k: usize,
}

impl<ID: Eq + Hash + Copy> LRUKReplacer<ID> {
    pub fn new(number_of_entries: usize, k: usize) -> Self {
        assert!(k > 0, "LRU-K needs k >= 1");

        LRUKReplacer {
            state: Mutex::new(LRUKState {
                node_store: LinkedHashMap::with_capacity(number_of_entries),
                current_timestamp: 0,
                evictable_size: 0,
            }),
            k,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

impl<ID: Eq + Hash + Copy + Send> Replacer<ID> for LRUKReplacer<ID> {
    fn victim(&self) -> Option<ID> {
        let mut state = self.state.lock();

        let evicted = state.find_victim()?;
        state.node_store.remove(&evicted);
        state.evictable_size -= 1;
        Some(evicted)
    }

    fn peek_victim(&self) -> Option<ID> {
        self.state.lock().find_victim()
    }

    fn pin(&self, entry_id: ID) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.record_access(entry_id, self.k);
        if let Some(node) = state.node_store.get_mut(&entry_id) {
            if node.is_evictable {
                node.is_evictable = false;
                state.evictable_size -= 1;
            }
        }
    }

    fn unpin(&self, entry_id: ID) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // Unpin without a prior pin still counts as the first access
        if !state.node_store.contains_key(&entry_id) {
            state.record_access(entry_id, self.k);
        }

        if let Some(node) = state.node_store.get_mut(&entry_id) {
            if !node.is_evictable {
                node.is_evictable = true;
                state.evictable_size += 1;
            }
        }
    }

    fn remove(&self, entry_id: ID) {
        let mut state = self.state.lock();

        if let Some(node) = state.node_store.remove(&entry_id) {
            if node.is_evictable {
                state.evictable_size -= 1;
            }
        }
    }

    fn is_evictable(&self, entry_id: ID) -> bool {
        self.state
            .lock()
            .node_store
            .get(&entry_id)
            .is_some_and(|node| node.is_evictable)
    }

    fn size(&self) -> usize {
        self.state.lock().evictable_size
    }
}
