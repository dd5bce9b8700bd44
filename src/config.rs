pub const DEFAULT_POOL_SIZE: usize = 64;
pub const DEFAULT_LRU_K: usize = 2;

/// Which replacement policy the buffer pool evicts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacerPolicy {
    /// Least recently unpinned frame first.
    #[default]
    Lru,
    /// Largest backward k-distance first.
    LruK { k: usize },
}

/// Configuration for a [`BufferPoolManager`](crate::buffer::buffer_pool_manager::BufferPoolManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub pool_size: usize,
    pub replacer: ReplacerPolicy,
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            replacer: ReplacerPolicy::Lru,
        }
    }

    pub fn with_replacer(mut self, replacer: ReplacerPolicy) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size == 0 {
            return Err("pool_size must be > 0");
        }
        if let ReplacerPolicy::LruK { k: 0 } = self.replacer {
            return Err("LRU-K needs k > 0");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
