use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use hashlink::LinkedHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId, INVALID_PAGE_ID};

use super::error::{check_buffer, DiskError, DiskResult};

/// Block device seen by the buffer pool.
///
/// Every call is synchronous. Implementations must be shareable between
/// threads because the pool hands out `Arc<dyn DiskManager>`.
pub trait DiskManager: Send + Sync {
    /// Fills `page_data` with the on-disk contents of `page_id`.
    ///
    /// A page that was allocated but never written reads back as zeros.
    fn read_page(&self, page_id: PageId, page_data: &mut [u8]) -> DiskResult<()>;

    fn write_page(&self, page_id: PageId, page_data: &[u8]) -> DiskResult<()>;

    fn allocate_page(&self) -> DiskResult<PageId>;

    /// Releases `page_id` for reuse. Unknown or already released ids are ignored.
    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()>;
}

struct FileMetadata {
    // page_id -> offset on disk. None marks a deallocated page whose slot
    // sits in `free_slots` waiting to be handed out again.
    pages: LinkedHashMap<PageId, Option<u64>>,

    // Id and offset of 'dead' pages, recycled first-in first-out
    free_slots: VecDeque<(PageId, u64)>,
}

struct FileState {
    db_io: File,
    meta: FileMetadata,
}

/// Disk manager backed by a single database file.
///
/// Page `p` lives at byte offset `p * PAGE_SIZE`.
pub struct FileDiskManager {
    path: PathBuf,
    state: Mutex<FileState>,

    num_reads: AtomicU64,
    num_writes: AtomicU64,
}

impl FileDiskManager {
    /// Opens the database file at `path`, creating it if needed.
    ///
    /// Every whole page already in the file is considered allocated.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();

        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let existing_pages = db_io.metadata()?.len() / PAGE_SIZE as u64;

        let mut pages = LinkedHashMap::with_capacity(existing_pages as usize);
        for page_id in 0..existing_pages {
            pages.insert(page_id as PageId, Some(page_id * PAGE_SIZE as u64));
        }

        debug!(path = %path.display(), existing_pages, "opened database file");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                db_io,
                meta: FileMetadata {
                    pages,
                    free_slots: VecDeque::new(),
                },
            }),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Number of live (allocated and not yet deallocated) pages.
    pub fn num_pages(&self) -> usize {
        let state = self.state.lock();
        state.meta.pages.values().filter(|offset| offset.is_some()).count()
    }

    fn page_offset(meta: &FileMetadata, page_id: PageId) -> DiskResult<u64> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskError::InvalidPageId);
        }

        match meta.pages.get(&page_id) {
            Some(Some(offset)) => Ok(*offset),
            Some(None) => Err(DiskError::PageDeallocated { page_id }),
            None => Err(DiskError::PageNotAllocated { page_id }),
        }
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, page_data: &mut [u8]) -> DiskResult<()> {
        check_buffer(page_data.len())?;

        let mut state = self.state.lock();
        let offset = Self::page_offset(&state.meta, page_id)?;

        // Allocated pages are not written out until their first flush
        let file_len = state.db_io.metadata()?.len();
        if offset >= file_len {
            page_data.fill(0);
            self.num_reads.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let available = (file_len - offset).min(PAGE_SIZE as u64) as usize;

        state.db_io.seek(SeekFrom::Start(offset))?;
        state.db_io.read_exact(&mut page_data[..available])?;
        page_data[available..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page_data: &[u8]) -> DiskResult<()> {
        check_buffer(page_data.len())?;

        let mut state = self.state.lock();
        let offset = Self::page_offset(&state.meta, page_id)?;

        state.db_io.seek(SeekFrom::Start(offset))?;
        state.db_io.write_all(page_data)?;
        state.db_io.flush()?;
        state.db_io.sync_data()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self) -> DiskResult<PageId> {
        let mut state = self.state.lock();
        let meta = &mut state.meta;

        // Try to pop a free slot
        if let Some((page_id, offset)) = meta.free_slots.pop_front() {
            meta.pages.replace(page_id, Some(offset));
            debug!(page_id, "reallocated page");
            return Ok(page_id);
        }

        // No free slots, append a new page
        let page_id = meta.pages.len() as PageId;
        if page_id == INVALID_PAGE_ID {
            return Err(DiskError::InvalidPageId);
        }

        meta.pages
            .insert(page_id, Some(page_id as u64 * PAGE_SIZE as u64));
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        let mut state = self.state.lock();
        let meta = &mut state.meta;

        if let Some(Some(offset)) = meta.pages.get(&page_id).copied() {
            meta.pages.replace(page_id, None);
            meta.free_slots.push_back((page_id, offset));
            debug!(page_id, "deallocated page");
        }

        Ok(())
    }
}
