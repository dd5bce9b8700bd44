use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

use anyhow::Context;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::{
    buffer::stats::{BufferPoolStats, PoolCounters},
    config::{BufferPoolConfig, ReplacerPolicy},
    storage::{
        disk::manager::DiskManager,
        page::{
            page::{is_valid_page_id, page_constants::PAGE_SIZE, FrameId, PageId, INVALID_PAGE_ID},
            page_guard::{AccessType, PageGuard, ReadGuard, WriteGuard},
        },
    },
    utils::replacer::{LRUKReplacer, LRUReplacer, Replacer},
    wal::LogManager,
};

/// One slot of the pool.
///
/// The metadata atomics are only written while the pool latch is held, so a
/// pinned frame reports a stable `page_id`. The bytes sit behind their own
/// lock; release it before calling back into the pool for the same page.
pub struct FrameHeader {
    pub frame_id: FrameId,
    page_id: AtomicU32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,

    data: RwLock<Box<[u8]>>,
}

impl FrameHeader {
    fn new(frame_id: FrameId) -> Self {
        FrameHeader {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Acquire)
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Writable bytes. Writing does not mark the frame dirty; pass
    /// `is_dirty = true` to `unpin_page` for that.
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    // Latch held. Bytes are set up by the caller.
    fn install(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::Release);
        self.pin_count.store(1, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
    }

    // Latch held. Back to the free-list state.
    fn reset(&self) {
        self.data.write().fill(0);
        self.page_id.store(INVALID_PAGE_ID, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
    }
}

// Everything guarded by the pool latch
struct PoolState {
    // page_id -> frame holding it
    page_table: HashMap<PageId, FrameId>,

    // Frames holding no page
    free_list: VecDeque<FrameId>,
}

/// Fixed-size cache of disk pages.
///
/// Every public operation holds one pool-wide latch for its whole body,
/// disk I/O included. The replacer's own lock nests inside it.
pub struct BufferPoolManager {
    pool_size: usize,

    // The frames that this buffer pool manages
    frames: Box<[FrameHeader]>,

    latch: Mutex<PoolState>,

    // Tracks unpinned frames, candidates for eviction
    replacer: Box<dyn Replacer<FrameId>>,

    disk_manager: Arc<dyn DiskManager>,

    // Held for recovery, never called by the pool
    log_manager: Option<Arc<LogManager>>,

    counters: PoolCounters,
}

impl BufferPoolManager {
    /// Builds a pool of `pool_size` zeroed frames using LRU replacement.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let replacer = Box::new(LRUReplacer::<FrameId>::new(pool_size));
        Self::with_replacer(pool_size, replacer, disk_manager, log_manager)
    }

    pub fn with_config(
        config: &BufferPoolConfig,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid buffer pool configuration")?;

        let replacer: Box<dyn Replacer<FrameId>> = match config.replacer {
            ReplacerPolicy::Lru => Box::new(LRUReplacer::<FrameId>::new(config.pool_size)),
            ReplacerPolicy::LruK { k } => {
                Box::new(LRUKReplacer::<FrameId>::new(config.pool_size, k))
            }
        };

        Ok(Self::with_replacer(
            config.pool_size,
            replacer,
            disk_manager,
            log_manager,
        ))
    }

    pub fn with_replacer(
        pool_size: usize,
        replacer: Box<dyn Replacer<FrameId>>,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let frames: Box<[FrameHeader]> = (0..pool_size).map(FrameHeader::new).collect();

        // Initially, every frame is free
        let free_list: VecDeque<FrameId> = (0..pool_size).collect();

        Self {
            pool_size,
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer,
            disk_manager,
            log_manager,
            counters: PoolCounters::default(),
        }
    }

    /// Pins `page_id`, reading it from disk on a miss.
    ///
    /// Returns `Ok(None)` when every frame is pinned, or when the disk
    /// manager does not know the page (never allocated, or deleted).
    pub fn fetch_page(&self, page_id: PageId) -> anyhow::Result<Option<&FrameHeader>> {
        if !is_valid_page_id(page_id) {
            return Ok(None);
        }

        let mut state = self.latch.lock();
        PoolCounters::bump(&self.counters.fetches);

        // Page in memory
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            frame.pin_count.fetch_add(1, Ordering::AcqRel);
            self.replacer.pin(frame_id);

            PoolCounters::bump(&self.counters.hits);
            trace!(page_id, frame_id, "page hit");
            return Ok(Some(frame));
        }

        PoolCounters::bump(&self.counters.misses);

        let Some(frame_id) = self.take_frame(&mut state)? else {
            debug!(page_id, "cannot fetch page, every frame is pinned");
            return Ok(None);
        };
        let frame = &self.frames[frame_id];

        let read = {
            let mut data = frame.data.write();
            data.fill(0);
            self.disk_manager.read_page(page_id, &mut data[..])
        };

        if let Err(err) = read {
            // Nothing was installed, hand the frame back untouched
            frame.reset();
            state.free_list.push_back(frame_id);

            if err.is_missing_page() {
                debug!(page_id, "page does not exist on disk");
                return Ok(None);
            }
            return Err(err).with_context(|| format!("failed to read page {page_id}"));
        }

        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        debug!(page_id, frame_id, "read page into frame");
        Ok(Some(frame))
    }

    /// Allocates a fresh page on disk and pins a zeroed frame for it.
    ///
    /// The new id is `frame.page_id()`. No id is allocated when no frame
    /// can be secured.
    pub fn new_page(&self) -> anyhow::Result<Option<&FrameHeader>> {
        let mut state = self.latch.lock();

        let Some(frame_id) = self.take_frame(&mut state)? else {
            debug!("cannot create page, every frame is pinned");
            return Ok(None);
        };
        let frame = &self.frames[frame_id];

        let page_id = match self.allocate_unused_id(&state) {
            Ok(page_id) => page_id,
            Err(err) => {
                frame.reset();
                state.free_list.push_back(frame_id);
                return Err(err);
            }
        };

        frame.data.write().fill(0);
        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        PoolCounters::bump(&self.counters.allocations);
        debug!(page_id, frame_id, "created page");
        Ok(Some(frame))
    }

    /// Drops one pin on `page_id`, marking it dirty if `is_dirty`.
    ///
    /// Returns false, and changes nothing, when the page is not cached or
    /// has no pins left.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            debug!(page_id, "unpin of a page that is not cached");
            return false;
        };

        let frame = &self.frames[frame_id];
        let pin_count = frame.pin_count();
        if pin_count == 0 {
            warn!(page_id, frame_id, "unbalanced unpin");
            return false;
        }

        frame.pin_count.store(pin_count - 1, Ordering::Release);
        // Stays dirty until written back
        if is_dirty {
            frame.is_dirty.store(true, Ordering::Release);
        }

        if pin_count == 1 {
            self.replacer.unpin(frame_id);
        }

        true
    }

    /// Writes `page_id` back if it is cached and dirty, pinned or not.
    ///
    /// Returns whether the page is cached. The bytes of a pinned page may be
    /// locked by its user, so they are written with the latch released.
    pub fn flush_page(&self, page_id: PageId) -> anyhow::Result<bool> {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id];

        if frame.pin_count() == 0 {
            return self.flush_page_latched(&state, page_id);
        }
        if !frame.is_dirty() {
            return Ok(true);
        }

        // The extra pin keeps the page in this frame while unlatched. An
        // unpin that dirties it again in the meantime sets the flag back.
        frame.pin_count.fetch_add(1, Ordering::AcqRel);
        frame.is_dirty.store(false, Ordering::Release);

        let written = MutexGuard::unlocked(&mut state, || {
            let data = frame.data.read();
            self.write_back(page_id, &data[..])
        });

        if written.is_err() {
            frame.is_dirty.store(true, Ordering::Release);
        }
        if frame.pin_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.replacer.unpin(frame_id);
        }

        written?;
        Ok(true)
    }

    /// Writes back every cached dirty page.
    pub fn flush_all(&self) -> anyhow::Result<()> {
        let cached: Vec<PageId> = {
            let _state = self.latch.lock();
            self.frames
                .iter()
                .map(FrameHeader::page_id)
                .filter(|&page_id| is_valid_page_id(page_id))
                .collect()
        };

        // A page evicted in between was written back on its way out
        for page_id in cached {
            self.flush_page(page_id)?;
        }

        Ok(())
    }

    /// Deallocates `page_id` on disk and drops it from the pool.
    ///
    /// The page is deallocated even while pinned; the call then returns
    /// false and the frame keeps the page until it is unpinned and deleted
    /// again. `new_page` never hands out an id that a frame still holds.
    pub fn delete_page(&self, page_id: PageId) -> anyhow::Result<bool> {
        let mut state = self.latch.lock();

        self.disk_manager
            .deallocate_page(page_id)
            .with_context(|| format!("failed to deallocate page {page_id}"))?;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            PoolCounters::bump(&self.counters.deletions);
            return Ok(true);
        };

        if self.frames[frame_id].pin_count() > 0 {
            debug!(page_id, frame_id, "deallocated a page that is still pinned");
            return Ok(false);
        }

        PoolCounters::bump(&self.counters.deletions);
        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        self.frames[frame_id].reset();
        state.free_list.push_back(frame_id);

        debug!(page_id, frame_id, "deleted page");
        Ok(true)
    }

    /// Pins `page_id` behind a guard that unpins it when dropped.
    pub fn read_page(&self, page_id: PageId) -> anyhow::Result<Option<ReadGuard<'_>>> {
        Ok(self
            .check_page(page_id, AccessType::Read)?
            .and_then(PageGuard::into_read_guard))
    }

    /// Like `read_page`, but the guard can write and unpins dirty if it did.
    pub fn write_page(&self, page_id: PageId) -> anyhow::Result<Option<WriteGuard<'_>>> {
        Ok(self
            .check_page(page_id, AccessType::Write)?
            .and_then(PageGuard::into_write_guard))
    }

    /// `new_page` wrapped in a write guard.
    pub fn new_page_guarded(&self) -> anyhow::Result<Option<WriteGuard<'_>>> {
        Ok(self
            .new_page()?
            .map(|frame| WriteGuard::new(self, frame, frame.page_id())))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id].pin_count())
    }

    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id].is_dirty())
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.latch.lock().page_table.contains_key(&page_id)
    }

    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    pub fn evictable_count(&self) -> usize {
        let _state = self.latch.lock();
        self.replacer.size()
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.counters.snapshot()
    }

    pub fn disk_manager(&self) -> &Arc<dyn DiskManager> {
        &self.disk_manager
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    fn check_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> anyhow::Result<Option<PageGuard<'_>>> {
        let guard = self.fetch_page(page_id)?.map(|frame| match access_type {
            AccessType::Read => PageGuard::ReadGuard(ReadGuard::new(self, frame, page_id)),
            AccessType::Write => PageGuard::WriteGuard(WriteGuard::new(self, frame, page_id)),
        });

        Ok(guard)
    }

    // Finds a frame for a new resident: free list first, then a victim.
    // A dirty victim is written back and unmapped before it is returned.
    fn take_frame(&self, state: &mut PoolState) -> anyhow::Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.peek_victim() else {
            return Ok(None);
        };

        // On a failed write-back the victim stays first in line
        let evicted_page = self.frames[frame_id].page_id();
        self.flush_page_latched(state, evicted_page)?;

        self.replacer.remove(frame_id);
        state.page_table.remove(&evicted_page);
        PoolCounters::bump(&self.counters.evictions);
        debug!(page_id = evicted_page, frame_id, "evicted page");

        Ok(Some(frame_id))
    }

    // Never takes the latch: the caller already holds it, `state` is the proof
    fn flush_page_latched(&self, state: &PoolState, page_id: PageId) -> anyhow::Result<bool> {
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id];

        if frame.is_dirty() {
            {
                let data = frame.data.read();
                self.write_back(page_id, &data[..])?;
            }
            frame.is_dirty.store(false, Ordering::Release);
        }

        Ok(true)
    }

    // A page deallocated while pinned has nowhere to go on disk; its bytes
    // are dropped instead of failing every later eviction of the frame.
    fn write_back(&self, page_id: PageId, data: &[u8]) -> anyhow::Result<()> {
        match self.disk_manager.write_page(page_id, data) {
            Ok(()) => {
                PoolCounters::bump(&self.counters.write_backs);
                debug!(page_id, "wrote back dirty page");
                Ok(())
            }
            Err(err) if err.is_missing_page() => {
                debug!(page_id, "dropped the bytes of a deleted page");
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("failed to write back page {page_id}")),
        }
    }

    // Skips ids whose deleted page still sits pinned in a frame, then hands
    // them back to the disk manager.
    fn allocate_unused_id(&self, state: &PoolState) -> anyhow::Result<PageId> {
        let mut skipped = Vec::new();

        let allocated = loop {
            match self.disk_manager.allocate_page() {
                Ok(page_id) if state.page_table.contains_key(&page_id) => {
                    debug!(page_id, "skipping id of a deleted page that is still cached");
                    skipped.push(page_id);
                }
                other => break other.context("failed to allocate a new page"),
            }
        };

        for page_id in skipped {
            self.disk_manager
                .deallocate_page(page_id)
                .with_context(|| format!("failed to release page {page_id}"))?;
        }

        allocated
    }

    /// Panics if the page table, free list, replacer and frame metadata
    /// disagree.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let state = self.latch.lock();

        assert_eq!(
            state.free_list.len() + state.page_table.len(),
            self.pool_size,
            "free list and page table must cover every frame"
        );

        let mut seen = HashSet::new();
        for &frame_id in &state.free_list {
            assert!(seen.insert(frame_id), "frame {frame_id} listed twice");

            let frame = &self.frames[frame_id];
            assert_eq!(frame.page_id(), INVALID_PAGE_ID);
            assert_eq!(frame.pin_count(), 0);
            assert!(!frame.is_dirty());
            assert!(!self.replacer.is_evictable(frame_id));
        }

        let mut evictable = 0;
        for (&page_id, &frame_id) in &state.page_table {
            assert!(seen.insert(frame_id), "frame {frame_id} mapped twice");

            let frame = &self.frames[frame_id];
            assert_eq!(frame.page_id(), page_id);

            let unpinned = frame.pin_count() == 0;
            assert_eq!(self.replacer.is_evictable(frame_id), unpinned);
            if unpinned {
                evictable += 1;
            }
        }

        assert_eq!(self.replacer.size(), evictable);
    }
}
