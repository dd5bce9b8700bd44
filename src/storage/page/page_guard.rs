use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::buffer::buffer_pool_manager::{BufferPoolManager, FrameHeader};

use super::page::{FrameId, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
}

pub enum PageGuard<'a> {
    WriteGuard(WriteGuard<'a>),
    ReadGuard(ReadGuard<'a>),
}

impl<'a> PageGuard<'a> {
    pub fn into_read_guard(self) -> Option<ReadGuard<'a>> {
        if let PageGuard::ReadGuard(guard) = self {
            Some(guard)
        } else {
            None
        }
    }

    pub fn into_write_guard(self) -> Option<WriteGuard<'a>> {
        if let PageGuard::WriteGuard(guard) = self {
            Some(guard)
        } else {
            None
        }
    }
}

fn release(bpm: &BufferPoolManager, page_id: PageId, is_dirty: bool) {
    if !bpm.unpin_page(page_id, is_dirty) {
        warn!(page_id, "page guard dropped a page that was no longer pinned");
    }
}

/// A pinned page that is only read. Unpins clean on drop.
pub struct ReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
}

impl<'a> ReadGuard<'a> {
    // The frame must already carry the pin this guard releases
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a FrameHeader, page_id: PageId) -> Self {
        Self {
            bpm,
            frame,
            page_id,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id
    }

    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.frame.data()
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        release(self.bpm, self.page_id, false);
    }
}

/// A pinned page that may be written. Unpins dirty on drop if `data_mut`
/// or `mark_dirty` was called.
pub struct WriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> WriteGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a FrameHeader, page_id: PageId) -> Self {
        Self {
            bpm,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.frame.data()
    }

    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.is_dirty = true;
        self.frame.data_mut()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        release(self.bpm, self.page_id, self.is_dirty);
    }
}
