//! A fixed-size buffer pool that caches disk pages in memory.
//!
//! [`BufferPoolManager`] moves pages between a [`DiskManager`] and its
//! frames, and evicts unpinned frames through a [`Replacer`].

pub mod buffer;
pub mod config;
pub mod storage;
pub mod utils;
pub mod wal;

#[cfg(test)]
mod tests;

pub use buffer::buffer_pool_manager::{BufferPoolManager, FrameHeader};
pub use buffer::stats::BufferPoolStats;
pub use config::{BufferPoolConfig, ReplacerPolicy};
pub use storage::disk::{DiskError, DiskManager, FileDiskManager, MemoryDiskManager};
pub use storage::page::page::{FrameId, PageId, INVALID_PAGE_ID};
pub use storage::page::page_guard::{ReadGuard, WriteGuard};
pub use utils::replacer::{LRUKReplacer, LRUReplacer, Replacer};
pub use wal::LogManager;
