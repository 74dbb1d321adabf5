//! Walks the allocator's surface against a fixture slab. Run with
//! `RUST_LOG=info` to watch the arena initialize and grow.

use brkalloc::{FixedBreak, Heap, HeapConfig};

fn main() {
    env_logger::init();

    let heap = Heap::with_source(FixedBreak::new(64 * 1024), HeapConfig::new());

    let addr1 = heap.allocate(64).expect("slab has room");
    println!("Requested 64 bytes, received: {addr1:?}");

    let addr2 = heap.allocate(8).expect("slab has room");
    println!("Requested 8 bytes, received: {addr2:?}");

    let addr3 = heap.allocate(16).expect("slab has room");
    println!("Requested 16 bytes, received: {addr3:?}");

    let grown = unsafe { heap.resize(Some(addr2), 4096) }
        .expect("slab has room")
        .expect("nonzero size keeps a pointer");
    println!("Resized the 8-byte block to 4096 bytes, moved to: {grown:?}");

    unsafe {
        heap.release(addr1);
        heap.release(grown);
        heap.release(addr3);
    }

    let stats = heap.stats();
    println!(
        "Arena: {} bytes in {} growth calls, {} free block(s) left",
        stats.arena_bytes, stats.growth_calls, stats.free_blocks
    );
}
