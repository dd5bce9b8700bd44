pub mod error;
pub mod manager;
pub mod memory;

pub use error::{DiskError, DiskResult};
pub use manager::{DiskManager, FileDiskManager};
pub use memory::{DiskOp, MemoryDiskManager};
