use std::alloc::{GlobalAlloc, Layout};
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard};

use crate::arena::Arena;
use crate::block::{ALIGNMENT, HEADER_SIZE, NIL};
use crate::grow::{GrowHeap, ProcessBreak};
use crate::types::{AllocError, AllocResult, CoalescePolicy, HeapConfig, HeapStats};
use crate::utils::pad_block_size;

/// The heap manager.
///
/// One manager owns one arena, its block sequence and its free list, and
/// serializes every operation behind a single lock. Any number of
/// managers can coexist in a process as long as their growth sources
/// don't fight over the same memory; tests build one per case over a
/// [`FixedBreak`](crate::FixedBreak) slab.
///
/// All constructors are const, so a manager over the real process heap
/// can be a `static`, including the global allocator, see
/// `demos/global.rs`.
pub struct Heap<G: GrowHeap = ProcessBreak> {
    arena: Mutex<Arena<G>>,
}

// All arena state sits behind the mutex; the raw base pointer leaves a
// locked region only as caller-owned payload addresses.
unsafe impl<G: GrowHeap + Send> Send for Heap<G> {}
unsafe impl<G: GrowHeap + Send> Sync for Heap<G> {}

impl Heap<ProcessBreak> {
    /// Manager over the real process heap with the default configuration.
    pub const fn new() -> Self {
        Self::with_config(HeapConfig::new())
    }

    /// Manager over the real process heap with explicit tuning.
    pub const fn with_config(config: HeapConfig) -> Self {
        Self::with_source(ProcessBreak::new(), config)
    }
}

impl Default for Heap<ProcessBreak> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GrowHeap> Heap<G> {
    /// Manager over an arbitrary growth source.
    ///
    /// Panics if the configured growth unit is not a multiple of the
    /// block header size, or too small to hold a sentinel and a header.
    pub const fn with_source(source: G, config: HeapConfig) -> Self {
        assert!(
            config.growth_unit % HEADER_SIZE == 0 && config.growth_unit >= 2 * HEADER_SIZE,
            "growth unit must be a multiple of the block header size"
        );
        Self {
            arena: Mutex::new(Arena::new(source, config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arena<G>> {
        match self.arena.lock() {
            Ok(guard) => guard,
            // A panic mid-mutation may have left the structure torn.
            Err(_) => panic!("heap lock poisoned by a panicked operation: heap corrupted"),
        }
    }

    /// Hands out a zeroed region of at least `size` bytes.
    ///
    /// Requests are padded to the block granularity, so the usable
    /// capacity may exceed `size`. Zero-size requests are refused with
    /// [`AllocError::ZeroSize`]; a growth source that refuses to extend
    /// the arena surfaces as [`AllocError::OutOfMemory`].
    pub fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        let mut arena = self.lock();
        let result = Self::allocate_in(&mut arena, size);
        arena.check_free_head();
        result
    }

    fn allocate_in(arena: &mut Arena<G>, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let padded = match pad_block_size(size) {
            Some(padded) => padded,
            None => return Err(arena.exhausted(size)),
        };

        arena.ensure_initialized(padded)?;

        let off = match arena.take_fit(padded) {
            Some(off) => off,
            None => {
                // Nothing on the free list fits: grow once and retry
                // once. A second miss means the source is spent.
                arena.grow(padded)?;
                match arena.take_fit(padded) {
                    Some(off) => off,
                    None => return Err(arena.exhausted(size)),
                }
            }
        };

        let ptr = arena.payload_ptr(off);
        // Recycled blocks hold stale bytes from their earlier lives.
        // SAFETY: the block's full padded capacity was just carved out
        // for this caller.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, arena.header(off).size) };
        Ok(ptr)
    }

    /// Returns `ptr`'s block to the free list.
    ///
    /// Neighboring free blocks are merged according to the configured
    /// [`CoalescePolicy`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) or
    /// [`resize`](Self::resize) on this same heap and not released since.
    /// There is no reliable way to validate an arbitrary pointer against
    /// the block sequence, so anything detectably foreign (out of arena
    /// bounds, off the block granularity, already free) is treated as
    /// corruption and panics.
    pub unsafe fn release(&self, ptr: NonNull<u8>) {
        let mut arena = self.lock();
        Self::release_in(&mut arena, ptr);
        arena.check_free_head();
    }

    fn release_in(arena: &mut Arena<G>, ptr: NonNull<u8>) {
        let off = arena.block_of(ptr);
        let header = arena.header(off);
        if header.is_free() {
            panic!("double release of block {off:#x}");
        }
        if header.next_free != NIL {
            panic!("released block {off:#x} still threads the free list: heap corrupted");
        }

        arena.splice_into_free_list(off);

        if arena.config().coalesce == CoalescePolicy::OnRelease {
            arena.coalesce_right(off);
            arena.coalesce_left(off);
        }
    }

    /// Grows or shrinks an allocation.
    ///
    /// - `ptr` of `None` behaves as [`allocate`](Self::allocate).
    /// - `new_size` of zero behaves as [`release`](Self::release) and
    ///   yields `Ok(None)`.
    /// - A block whose capacity already covers `new_size` is returned
    ///   unchanged; there is no shrink-to-fit.
    /// - Otherwise the contents move to a fresh block and the old one is
    ///   released. On `Err` the old block is untouched and the original
    ///   pointer remains valid. No data is lost to a failed resize.
    ///
    /// The whole operation, relocation included, runs under the manager
    /// lock.
    ///
    /// # Safety
    ///
    /// As for [`release`](Self::release), when `ptr` is `Some` it must be
    /// a live allocation of this heap.
    pub unsafe fn resize(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let mut arena = self.lock();
        let result = match ptr {
            None => Self::allocate_in(&mut arena, new_size).map(Some),
            Some(ptr) if new_size == 0 => {
                Self::release_in(&mut arena, ptr);
                Ok(None)
            }
            Some(ptr) => {
                let off = arena.block_of(ptr);
                let old = arena.header(off);
                if old.is_free() {
                    panic!("resize of a released block {off:#x}");
                }

                if old.size >= new_size {
                    Ok(Some(ptr))
                } else {
                    match Self::allocate_in(&mut arena, new_size) {
                        Ok(new_ptr) => {
                            // SAFETY: both blocks are live and distinct;
                            // the new capacity exceeds the old one.
                            unsafe {
                                ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old.size);
                            }
                            Self::release_in(&mut arena, ptr);
                            Ok(Some(new_ptr))
                        }
                        Err(err) => Err(err),
                    }
                }
            }
        };
        arena.check_free_head();
        result
    }

    /// Snapshot of arena occupancy and growth counters.
    pub fn stats(&self) -> HeapStats {
        self.lock().stats()
    }

    /// Sweeps the whole structure and panics on any broken invariant.
    ///
    /// O(blocks) and runs under the manager lock; meant for tests and
    /// debugging, not for the allocation path.
    pub fn verify(&self) {
        self.lock().verify();
    }
}

/// The manager doubles as a global allocator (see `demos/global.rs`).
///
/// Payloads are naturally 8-aligned and no more; layouts wanting a larger
/// alignment are refused with null, and every failure maps to null per
/// the `GlobalAlloc` contract.
unsafe impl<G: GrowHeap> GlobalAlloc for Heap<G> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        match self.allocate(layout.size()) {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // Payloads are zeroed on every allocation already.
        unsafe { self.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.release(ptr) };
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        match unsafe { self.resize(NonNull::new(ptr), new_size) } {
            Ok(Some(ptr)) => ptr.as_ptr(),
            Ok(None) | Err(_) => ptr::null_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grow::FixedBreak;

    fn heap() -> Heap<FixedBreak> {
        Heap::with_source(FixedBreak::new(64 * 1024), HeapConfig::new())
    }

    #[test]
    fn basic_allocation_is_writable() {
        let heap = heap();
        let block = heap.allocate(std::mem::size_of::<u32>()).unwrap();

        unsafe {
            let value = block.cast::<u32>();
            value.write(23);
            assert_eq!(23, value.read());
        }
    }

    #[test]
    fn space_for_released_block_is_reused() {
        let heap = heap();

        let first_block = heap.allocate(4).unwrap();
        let _second = heap.allocate(8).unwrap();
        let _third = heap.allocate(8).unwrap();

        unsafe { heap.release(first_block) };

        let fourth_block = heap.allocate(4).unwrap();
        assert_eq!(first_block, fourth_block);
    }

    #[test]
    #[should_panic(expected = "growth unit must be a multiple")]
    fn misaligned_growth_unit_is_refused() {
        let _ = Heap::with_source(
            FixedBreak::new(4096),
            HeapConfig::new().with_growth_unit(100),
        );
    }
}
