use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId, INVALID_PAGE_ID};

use super::{
    error::{check_buffer, DiskError, DiskResult},
    manager::DiskManager,
};

/// One call made against a [`MemoryDiskManager`], in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOp {
    Read(PageId),
    Write(PageId),
    Allocate(PageId),
    Deallocate(PageId),
}

/// Disk manager that keeps pages in memory and records every call.
///
/// Used to observe what the buffer pool does to the device: how many times a
/// page was written, and whether a write-back happened before a read.
pub struct MemoryDiskManager {
    // Allocated pages. A page is present from allocation until deallocation
    pages: DashMap<PageId, Box<[u8]>>,
    next_page_id: AtomicU32,
    free_ids: SegQueue<PageId>,

    writes: DashMap<PageId, u64>,
    num_reads: AtomicU64,
    num_writes: AtomicU64,
    history: Mutex<Vec<DiskOp>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
            next_page_id: AtomicU32::new(0),
            free_ids: SegQueue::new(),
            writes: DashMap::new(),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::SeqCst)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::SeqCst)
    }

    /// Times `page_id` has been written since this manager was created.
    pub fn writes_for(&self, page_id: PageId) -> u64 {
        self.writes.get(&page_id).map(|count| *count).unwrap_or(0)
    }

    pub fn history(&self) -> Vec<DiskOp> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    /// Current on-"disk" bytes of `page_id`, bypassing the accounting.
    pub fn snapshot(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.get(&page_id).map(|page| page.to_vec())
    }

    fn record(&self, op: DiskOp) {
        self.history.lock().push(op);
    }

    fn missing(&self, page_id: PageId) -> DiskError {
        if page_id < self.next_page_id.load(Ordering::SeqCst) {
            DiskError::PageDeallocated { page_id }
        } else {
            DiskError::PageNotAllocated { page_id }
        }
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, page_data: &mut [u8]) -> DiskResult<()> {
        check_buffer(page_data.len())?;
        if page_id == INVALID_PAGE_ID {
            return Err(DiskError::InvalidPageId);
        }

        let page = self.pages.get(&page_id).ok_or_else(|| self.missing(page_id))?;
        page_data.copy_from_slice(&page);
        drop(page);

        self.num_reads.fetch_add(1, Ordering::SeqCst);
        self.record(DiskOp::Read(page_id));
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page_data: &[u8]) -> DiskResult<()> {
        check_buffer(page_data.len())?;
        if page_id == INVALID_PAGE_ID {
            return Err(DiskError::InvalidPageId);
        }

        let mut page = self
            .pages
            .get_mut(&page_id)
            .ok_or_else(|| self.missing(page_id))?;
        page.copy_from_slice(page_data);
        drop(page);

        *self.writes.entry(page_id).or_insert(0) += 1;
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        self.record(DiskOp::Write(page_id));
        Ok(())
    }

    fn allocate_page(&self) -> DiskResult<PageId> {
        let page_id = match self.free_ids.pop() {
            Some(page_id) => page_id,
            None => {
                let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
                if page_id == INVALID_PAGE_ID {
                    return Err(DiskError::InvalidPageId);
                }
                page_id
            }
        };

        self.pages
            .insert(page_id, vec![0u8; PAGE_SIZE].into_boxed_slice());
        self.record(DiskOp::Allocate(page_id));
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        self.record(DiskOp::Deallocate(page_id));

        if self.pages.remove(&page_id).is_some() {
            self.free_ids.push(page_id);
        }
        Ok(())
    }
}
