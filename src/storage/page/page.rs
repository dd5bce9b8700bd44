pub mod page_constants {
    // Size of every page on disk and of every frame in the pool
    pub const PAGE_SIZE: usize = 4096;
}

/// Logical page identifier handed out by the disk manager.
pub type PageId = u32;

/// Index of a frame inside the buffer pool, dense in `[0, pool_size)`.
pub type FrameId = usize;

// Reserved, never allocated. Marks frames that hold no page.
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

pub fn is_valid_page_id(page_id: PageId) -> bool {
    page_id != INVALID_PAGE_ID
}
