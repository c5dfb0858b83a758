//! Buffer Pool Manager tests.
//!
//! These exercise the same pin/evict/flush scenarios BusTub's
//! buffer_pool_manager_test.cpp covers, adapted to this crate's guard API
//! (RAII unpin on drop, `Result`-returning fetches instead of `Option`).

use anvildb::buffer::BufferPoolManager;
use anvildb::common::PageId;
use anvildb::storage::DiskManager;
use std::sync::Arc;
use tempfile::tempdir;

const FRAMES: usize = 10;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Helper to write a string to page data.
fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0; // null terminator
}

/// Helper to read a null-terminated string from page data.
fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

#[test]
fn test_very_basic() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let str_data = "Hello, world!";

    let pid = {
        let mut guard = bpm.new_page().unwrap();
        copy_string(guard.as_mut_slice(), str_data);
        assert_eq!(read_string(guard.as_slice()), str_data);
        guard.page_id()
    };

    {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(read_string(guard.as_slice()), str_data);
    }
    {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(read_string(guard.as_slice()), str_data);
    }

    assert!(bpm.delete_page(pid).is_ok());
}

/// Once a page's only guard is dropped, the frame must be evictable so a
/// full pool can still make room for new pages.
#[test]
fn test_page_pin_easy() {
    let (bpm, _dir) = create_bpm(2);

    let str0 = "page0";
    let str1 = "page1";
    let str0_updated = "page0updated";
    let str1_updated = "page1updated";

    let pageid0;
    let pageid1;
    {
        let mut page0_write = bpm.new_page().unwrap();
        pageid0 = page0_write.page_id();
        copy_string(page0_write.as_mut_slice(), str0);

        let mut page1_write = bpm.new_page().unwrap();
        pageid1 = page1_write.page_id();
        copy_string(page1_write.as_mut_slice(), str1);

        // Pool is full of pinned pages; a third allocation must fail.
        assert!(bpm.new_page().is_err());

        // Dropping the guards unpins the frames.
    }

    {
        // Now two more pages can be created (evicts pageid0 and pageid1).
        let temp0 = bpm.new_page().unwrap();
        let temp1 = bpm.new_page().unwrap();
        drop(temp0);
        drop(temp1);
    }

    {
        // Fetch original pages back - should reload from disk.
        let mut page0_write = bpm.fetch_page_write(pageid0).unwrap();
        assert_eq!(read_string(page0_write.as_slice()), str0);
        copy_string(page0_write.as_mut_slice(), str0_updated);

        let mut page1_write = bpm.fetch_page_write(pageid1).unwrap();
        assert_eq!(read_string(page1_write.as_slice()), str1);
        copy_string(page1_write.as_mut_slice(), str1_updated);
    }

    {
        // Verify updated data persisted.
        let page0_read = bpm.fetch_page_read(pageid0).unwrap();
        assert_eq!(read_string(page0_read.as_slice()), str0_updated);

        let page1_read = bpm.fetch_page_read(pageid1).unwrap();
        assert_eq!(read_string(page1_read.as_slice()), str1_updated);
    }
}

/// Fill the pool, confirm it refuses further allocation while every frame is
/// pinned, then confirm unpinning frees exactly the capacity we dropped.
#[test]
fn test_page_pin_medium() {
    let (bpm, _dir) = create_bpm(FRAMES);

    let pid0;
    let hello = "Hello";
    {
        let mut page0 = bpm.new_page().unwrap();
        pid0 = page0.page_id();
        copy_string(page0.as_mut_slice(), hello);
        assert_eq!(read_string(page0.as_slice()), hello);
    }

    // Fill up the buffer pool, holding every guard so nothing is evictable.
    let mut pages = Vec::new();
    for _ in 0..FRAMES {
        pages.push(bpm.new_page().unwrap());
    }
    assert_eq!(bpm.free_frame_count(), 0);

    // Pool is full and every frame pinned: no further allocation possible.
    for _ in 0..FRAMES {
        assert!(bpm.new_page().is_err());
    }

    // Drop half the guards to unpin their frames.
    for _ in 0..(FRAMES / 2) {
        pages.remove(0);
    }
    assert_eq!(bpm.free_frame_count(), FRAMES / 2);

    // We can now fetch page 0 back (one of the freed frames is reused).
    {
        let original_page = bpm.fetch_page_read(pid0).unwrap();
        assert_eq!(read_string(original_page.as_slice()), hello);
    }
}

/// Mirrors BusTub's PageGuardTest.DropTest: explicit early drops unpin
/// immediately, a second drop of an already-dropped guard is a non-issue
/// because ownership makes a second drop unreachable, and guards release
/// their latch even when the scope exits without an explicit drop.
#[test]
fn test_drop() {
    let (bpm, _dir) = create_bpm(FRAMES);

    let pid1;
    let pid2;
    {
        let pid0 = bpm.new_page().unwrap().page_id();
        // Dropping here (end of scope) unpins the frame; deleting it right
        // after confirms the unpin took effect.
        assert!(bpm.delete_page(pid0).is_ok());
    }

    {
        let page1 = bpm.new_page().unwrap();
        pid1 = page1.page_id();
        let page2 = bpm.new_page().unwrap();
        pid2 = page2.page_id();
        // Dropping here unpins both pages.
    }

    // This would hang if the latches were not released correctly on drop.
    {
        let _write_test1 = bpm.fetch_page_write(pid1).unwrap();
        let _write_test2 = bpm.fetch_page_write(pid2).unwrap();
    }

    let mut page_ids = Vec::new();
    {
        let mut guards = Vec::new();
        for _ in 0..FRAMES {
            let guard = bpm.new_page().unwrap();
            page_ids.push(guard.page_id());
            guards.push(guard);
        }
    } // Drops all guards.
    assert_eq!(bpm.free_frame_count(), FRAMES);

    // Write data, drop, evict it, then retrieve it again.
    let mutable_page_id = {
        let mut guard = bpm.new_page().unwrap();
        copy_string(guard.as_mut_slice(), "data");
        guard.page_id()
    };

    {
        let mut guards = Vec::new();
        for _ in 0..FRAMES {
            guards.push(bpm.new_page().unwrap());
        }
    } // Fills the pool again, evicting mutable_page_id's frame.

    {
        let guard = bpm.fetch_page_read(mutable_page_id).unwrap();
        assert_eq!(read_string(guard.as_slice()), "data");
    }
}

/// Core invariant: a pinned page cannot be evicted, even under concurrent
/// readers hammering a single-frame pool.
#[test]
fn test_evictable() {
    use std::sync::{Condvar, Mutex};
    use std::thread;

    const ROUNDS: usize = 20;
    const NUM_READERS: usize = 4;

    let (bpm, _dir) = create_bpm(1); // Only 1 frame
    let bpm = Arc::new(bpm);

    for round in 0..ROUNDS {
        let winner_pid = bpm.new_page().unwrap().page_id();
        let loser_pid = bpm.new_page().unwrap().page_id();
        // At this point: frame has loser, winner is on disk.

        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let mut readers = Vec::new();

        for _ in 0..NUM_READERS {
            let bpm_clone = Arc::clone(&bpm);
            let signal_clone = Arc::clone(&signal);
            let loser = loser_pid;

            readers.push(thread::spawn(move || {
                let (lock, cvar) = &*signal_clone;
                {
                    let mut started = lock.lock().unwrap();
                    while !*started {
                        started = cvar.wait(started).unwrap();
                    }
                }

                // Since the only frame is pinned by the winner, loser can't
                // be brought in.
                assert!(
                    bpm_clone.fetch_page_read(loser).is_err(),
                    "round {round}: loser should not be fetchable while winner is pinned"
                );
            }));
        }

        let winner_guard = bpm.fetch_page_read(winner_pid).unwrap();

        {
            let (lock, cvar) = &*signal;
            let mut started = lock.lock().unwrap();
            *started = true;
            cvar.notify_all();
        }

        for reader in readers {
            reader.join().unwrap();
        }

        drop(winner_guard);
    }
}

/// Holding a write latch on one page must not block acquiring the latch on
/// a different page (no pool-wide lock hidden behind per-page latches).
#[test]
fn test_page_access() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    let (bpm, _dir) = create_bpm(FRAMES);
    let bpm = Arc::new(bpm);

    let pid0 = bpm.new_page().unwrap().page_id();
    let pid1 = bpm.new_page().unwrap().page_id();

    let mut guard0 = bpm.fetch_page_write(pid0).unwrap();

    let start = Arc::new(AtomicBool::new(false));
    let start_clone = Arc::clone(&start);
    let bpm_clone = Arc::clone(&bpm);

    let child = thread::spawn(move || {
        start_clone.store(true, Ordering::SeqCst);
        // Blocks until the main thread releases page 0.
        let _guard0 = bpm_clone.fetch_page_write(pid0).unwrap();
    });

    while !start.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(50));

    // Deadlocks here if per-page latching is wrong.
    let _guard1 = bpm.fetch_page_write(pid1).unwrap();

    drop(guard0);
    child.join().unwrap();
}

#[test]
fn test_new_page_convenience() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let data = b"Hello, world!";

    let pid = {
        let mut guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(0));
        guard.as_mut_slice()[..data.len()].copy_from_slice(data);
        guard.page_id()
    };

    {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(&guard.as_slice()[..data.len()], data);
    }

    bpm.delete_page(pid).unwrap();
    assert_eq!(bpm.page_count(), 0);
}
