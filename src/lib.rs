//! A first-fit allocator over a break-style growable heap.
//!
//! One [`Heap`] manages a single arena obtained from its growth source in
//! large increments and carved into blocks. Every block carries a header
//! directly in front of its payload, so the bookkeeping lives inside the
//! managed memory itself:
//!
//! ```text
//! +------------------------------+
//! | Header   | Payload           |
//! +------------------------------+
//!            ^
//!            returned pointer
//! ```
//!
//! The headers form two structures at once: a doubly-threaded sequence
//! covering the arena back to back, and a singly-linked, address-ordered
//! free list of the blocks currently up for reuse. Allocation walks the
//! free list first-fit, splitting oversized blocks; release splices the
//! block back in address order and, by default, merges it with free
//! neighbors. When nothing fits, the arena grows at its top by whole
//! granularity units and never shrinks back.
//!
//! Every operation runs under one lock per heap, so a `Heap` can be
//! shared freely across threads. Corruption of the embedded bookkeeping
//! (stomped headers, double releases, foreign pointers) is detected
//! defensively and is always fatal: the crate panics with a diagnostic
//! rather than limping on and spreading the damage.
//!
//! # Usage
//!
//! ```
//! use brkalloc::{FixedBreak, Heap, HeapConfig};
//!
//! let heap = Heap::with_source(FixedBreak::new(64 * 1024), HeapConfig::new());
//!
//! let ptr = heap.allocate(128).expect("fixture slab has room");
//! // ... 128 zeroed bytes at `ptr` ...
//! unsafe { heap.release(ptr) };
//! ```
//!
//! Over the real process heap, `Heap::new()` is const and can back a
//! `static`, including `#[global_allocator]`; see `demos/global.rs`.

mod arena;
mod block;
mod freelist;
mod grow;
mod heap;
mod types;
mod utils;

pub use grow::{FixedBreak, GrowHeap, ProcessBreak};
pub use heap::Heap;
pub use types::{
    AllocError, AllocResult, CoalescePolicy, DEFAULT_GROWTH_UNIT, HeapConfig, HeapStats,
};
