#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use crate::{
        buffer::buffer_pool_manager::BufferPoolManager,
        storage::{disk::MemoryDiskManager, page::page::page_constants::PAGE_SIZE},
    };

    const NUM_FRAMES: usize = 10;

    #[test]
    fn guards_unpin_on_drop() {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(NUM_FRAMES, disk.clone(), None);

        let pid_0 = {
            let guard = bpm.new_page_guarded().unwrap().unwrap();
            assert_eq!(Some(1), bpm.get_pin_count(guard.page_id()));
            guard.page_id()
        };
        assert_eq!(Some(0), bpm.get_pin_count(pid_0));

        {
            let read_guard = bpm.read_page(pid_0).unwrap().unwrap();
            assert_eq!(Some(1), bpm.get_pin_count(pid_0));
            drop(read_guard);

            let write_guard = bpm.write_page(pid_0).unwrap().unwrap();
            assert_eq!(Some(1), bpm.get_pin_count(pid_0));
            drop(write_guard);
        }
        assert_eq!(Some(0), bpm.get_pin_count(pid_0));

        {
            let _read_1 = bpm.read_page(pid_0).unwrap().unwrap();
            let _read_2 = bpm.read_page(pid_0).unwrap().unwrap();
            assert_eq!(Some(2), bpm.get_pin_count(pid_0));
        }
        assert_eq!(Some(0), bpm.get_pin_count(pid_0));
        assert_eq!(bpm.is_dirty(pid_0), Some(false));
        bpm.check_invariants();
    }

    #[test]
    fn write_guard_marks_dirty_only_when_written() {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(NUM_FRAMES, disk, None);

        let page_id = bpm.new_page_guarded().unwrap().unwrap().page_id();

        {
            let guard = bpm.write_page(page_id).unwrap().unwrap();
            assert!(!guard.is_dirty());
        }
        assert_eq!(bpm.is_dirty(page_id), Some(false));

        {
            let mut guard = bpm.write_page(page_id).unwrap().unwrap();
            guard.data_mut()[0] = 7;
            assert!(guard.is_dirty());
        }
        assert_eq!(bpm.is_dirty(page_id), Some(true));

        bpm.flush_page(page_id).unwrap();
        {
            let mut guard = bpm.write_page(page_id).unwrap().unwrap();
            guard.mark_dirty();
        }
        assert_eq!(bpm.is_dirty(page_id), Some(true));
    }

    #[test]
    fn written_data_survives_eviction() {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(NUM_FRAMES, disk.clone(), None);

        let mutable_page_id = {
            let mut guard = bpm.new_page_guarded().unwrap().unwrap();
            guard.data_mut().copy_from_slice(&[1; PAGE_SIZE]);
            guard.page_id()
        };

        // Fill up the pool twice over, pushing the page out
        for _ in 0..NUM_FRAMES * 2 {
            bpm.new_page_guarded().unwrap().unwrap();
        }
        assert!(!bpm.is_cached(mutable_page_id));
        assert_eq!(disk.writes_for(mutable_page_id), 1);

        // Untouched pages are dropped clean
        assert_eq!(bpm.stats().write_backs, 1);

        let guard = bpm.read_page(mutable_page_id).unwrap().unwrap();
        assert_eq!(&guard.data()[..], &[1; PAGE_SIZE]);
        assert_eq!(guard.page_id(), mutable_page_id);
    }

    #[test]
    fn guard_is_none_when_pool_is_exhausted() {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(1, disk, None);

        let held = bpm.new_page_guarded().unwrap().unwrap();
        assert!(bpm.new_page_guarded().unwrap().is_none());
        assert!(bpm.read_page(held.page_id() + 1).unwrap().is_none());

        let other = held.page_id();
        drop(held);
        assert!(bpm.write_page(other).unwrap().is_some());
        bpm.check_invariants();
    }

    #[test]
    fn guard_frame_matches_the_pool() {
        let disk = Arc::new(MemoryDiskManager::new());
        let bpm = BufferPoolManager::new(NUM_FRAMES, disk, None);

        let guard = bpm.new_page_guarded().unwrap().unwrap();
        let frame = bpm.fetch_page(guard.page_id()).unwrap().unwrap();
        assert_eq!(frame.frame_id, guard.frame_id());
        assert!(bpm.unpin_page(guard.page_id(), false));
    }
}
