use std::io;

use thiserror::Error;

use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId};

/// Errors raised by a [`DiskManager`](super::manager::DiskManager).
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("page {page_id} has not been allocated")]
    PageNotAllocated { page_id: PageId },

    #[error("page {page_id} has been deallocated")]
    PageDeallocated { page_id: PageId },

    #[error("the invalid page id cannot be used for I/O")]
    InvalidPageId,

    #[error("buffer of {len} bytes does not match the page size of {PAGE_SIZE}")]
    BufferSize { len: usize },

    #[error("disk I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type DiskResult<T> = Result<T, DiskError>;

impl DiskError {
    /// True when the page simply does not exist on disk (never allocated or freed).
    pub fn is_missing_page(&self) -> bool {
        matches!(
            self,
            DiskError::PageNotAllocated { .. } | DiskError::PageDeallocated { .. }
        )
    }
}

pub(crate) fn check_buffer(len: usize) -> DiskResult<()> {
    if len != PAGE_SIZE {
        return Err(DiskError::BufferSize { len });
    }
    Ok(())
}
