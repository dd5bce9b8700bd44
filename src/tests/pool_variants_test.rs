#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::{
        buffer::buffer_pool_manager::BufferPoolManager,
        config::{BufferPoolConfig, ReplacerPolicy},
        storage::{
            disk::{FileDiskManager, MemoryDiskManager},
            page::page::page_constants::PAGE_SIZE,
        },
        wal::LogManager,
    };

    #[test]
    fn lru_k_pool_keeps_the_hot_page() {
        let config = BufferPoolConfig::new(2).with_replacer(ReplacerPolicy::LruK { k: 2 });
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::with_config(&config, disk, None).unwrap();

        let p0 = bpm.new_page().unwrap().unwrap().page_id();
        let p1 = bpm.new_page().unwrap().unwrap().page_id();
        assert!(bpm.unpin_page(p0, false));
        assert!(bpm.unpin_page(p1, false));

        // A second access gives p0 a finite k-distance; p1 still has one access
        assert!(bpm.fetch_page(p0).unwrap().is_some());
        assert!(bpm.unpin_page(p0, false));

        let p2 = bpm.new_page().unwrap().unwrap().page_id();
        assert!(bpm.is_cached(p0));
        assert!(!bpm.is_cached(p1));
        assert!(bpm.is_cached(p2));
        bpm.check_invariants();

        assert!(bpm.delete_page(p0).unwrap());
        assert_eq!(bpm.evictable_count(), 0);
        bpm.check_invariants();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let disk = Arc::new(MemoryDiskManager::new());

        let err = BufferPoolManager::with_config(&BufferPoolConfig::new(0), disk.clone(), None)
            .err()
            .expect("empty pool");
        assert!(format!("{err:#}").contains("pool_size"));

        let config = BufferPoolConfig::default().with_replacer(ReplacerPolicy::LruK { k: 0 });
        assert!(BufferPoolManager::with_config(&config, disk, None).is_err());
    }

    #[test]
    fn file_backed_pool_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("geode.db");

        let page_ids = {
            let disk = Arc::new(FileDiskManager::open(&db_path).unwrap());
            let bpm = BufferPoolManager::new(2, disk.clone(), None);

            let page_ids: Vec<_> = (0..5u8)
                .map(|i| {
                    let mut guard = bpm.new_page_guarded().unwrap().unwrap();
                    guard.data_mut().fill(i + 1);
                    guard.page_id()
                })
                .collect();

            // Three of them were evicted and written on the way
            assert_eq!(disk.num_writes(), 3);
            bpm.flush_all().unwrap();
            assert_eq!(disk.num_writes(), 5);
            page_ids
        };

        let disk = Arc::new(FileDiskManager::open(&db_path).unwrap());
        assert_eq!(disk.num_pages(), 5);

        let bpm = BufferPoolManager::new(2, disk.clone(), None);
        for (i, &page_id) in page_ids.iter().enumerate() {
            let guard = bpm.read_page(page_id).unwrap().unwrap();
            assert_eq!(guard.data().len(), PAGE_SIZE);
            assert!(guard.data().iter().all(|&b| b == i as u8 + 1));
        }
        assert_eq!(disk.num_reads(), 5);

        assert!(bpm.delete_page(page_ids[0]).unwrap());
        assert_eq!(disk.num_pages(), 4);
        assert!(bpm.fetch_page(page_ids[0]).unwrap().is_none());
        bpm.check_invariants();
    }

    #[test]
    fn pool_holds_the_log_manager() {
        let dir = tempdir().unwrap();
        let log = Arc::new(LogManager::open(dir.path().join("geode.log")).unwrap());
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(4, disk, Some(log.clone()));

        let page_id = bpm.new_page().unwrap().unwrap().page_id();
        assert!(bpm.unpin_page(page_id, true));
        bpm.flush_all().unwrap();

        // The pool never writes to the log
        assert!(Arc::ptr_eq(bpm.log_manager().unwrap(), &log));
        assert_eq!(log.next_lsn(), 1);
        assert!(LogManager::read_records(log.path()).unwrap().is_empty());
    }
}
