use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters of a buffer pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub fetches: u64,
    pub hits: u64,
    pub misses: u64,
    /// Frames taken from the replacer to hold another page.
    pub evictions: u64,
    /// Dirty pages written to disk, by eviction or flush.
    pub write_backs: u64,
    pub allocations: u64,
    pub deletions: u64,
}

impl BufferPoolStats {
    /// Fraction of fetches served without a disk read (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub fetches: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub write_backs: AtomicU64,
    pub allocations: AtomicU64,
    pub deletions: AtomicU64,
}

impl PoolCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BufferPoolStats {
        BufferPoolStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_ratio() {
        let mut stats = BufferPoolStats::default();
        assert_eq!(stats.hit_ratio(), 0.0);

        stats.fetches = 10;
        stats.hits = 4;
        assert!((stats.hit_ratio() - 0.4).abs() < f64::EPSILON);
    }
}
