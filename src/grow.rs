//! Growth primitives: where the arena's memory actually comes from.
//!
//! The manager only ever asks its source one thing, "extend the heap
//! upward by this many bytes", and expects the granted range to sit
//! exactly on top of the previous one. That is the whole contract, so it
//! lives behind a small trait with one platform-backed implementation and
//! one self-contained implementation for tests and embedding.

use std::alloc::{self, Layout, handle_alloc_error};
use std::ptr::NonNull;

use crate::block::ALIGNMENT;

/// A break-style heap source.
///
/// # Safety
///
/// Implementors promise that a successful `grow_heap(extra)` returns the
/// new top of a monotonically growing range: the `extra` bytes directly
/// below the returned pointer are valid for reads and writes, contiguous
/// with every previously granted byte, and stay valid until the source is
/// dropped. The arena layers raw header accesses on top of this.
pub unsafe trait GrowHeap {
    /// Extends the heap upward by `extra` bytes, returning the new top of
    /// heap, or `None` if the underlying source refuses.
    fn grow_heap(&mut self, extra: usize) -> Option<NonNull<u8>>;
}

/// The real process heap.
///
/// On Unix this moves the program break with `sbrk`, which is exactly the
/// monotonic-contiguous source the arena wants. Windows has no break to
/// move, so a large address range is reserved once with `VirtualAlloc`
/// and committed upward in increments; the byte-granular top is tracked
/// here since commits are page-sized.
pub struct ProcessBreak {
    #[cfg(windows)]
    reservation: windows_impl::Reservation,
}

impl ProcessBreak {
    pub const fn new() -> Self {
        Self {
            #[cfg(windows)]
            reservation: windows_impl::Reservation::new(),
        }
    }
}

impl Default for ProcessBreak {
    fn default() -> Self {
        Self::new()
    }
}

// The break is process-global state either way; the heap manager's lock
// serializes every use of it.
unsafe impl Send for ProcessBreak {}

#[cfg(unix)]
mod unix {
    use super::{GrowHeap, ProcessBreak};

    use libc::{c_void, intptr_t, sbrk};

    use std::ptr::NonNull;

    unsafe impl GrowHeap for ProcessBreak {
        fn grow_heap(&mut self, extra: usize) -> Option<NonNull<u8>> {
            unsafe {
                // sbrk hands back the previous break, which is the bottom
                // of the freshly granted range.
                let old = sbrk(extra as intptr_t);
                if old == usize::MAX as *mut c_void {
                    return None;
                }
                NonNull::new(old.cast::<u8>().add(extra))
            }
        }
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::{GrowHeap, ProcessBreak};

    use windows::Win32::System::Memory;

    use std::os::raw::c_void;
    use std::ptr::{self, NonNull};

    /// Upper bound of the reserved address range the commits grow into.
    const RESERVE_BYTES: usize = 256 * 1024 * 1024;

    pub(super) struct Reservation {
        base: *mut u8,
        brk: usize,
    }

    impl Reservation {
        pub(super) const fn new() -> Self {
            Self {
                base: ptr::null_mut(),
                brk: 0,
            }
        }
    }

    unsafe impl GrowHeap for ProcessBreak {
        fn grow_heap(&mut self, extra: usize) -> Option<NonNull<u8>> {
            let reservation = &mut self.reservation;

            unsafe {
                if reservation.base.is_null() {
                    let addr = Memory::VirtualAlloc(
                        None,
                        RESERVE_BYTES,
                        Memory::MEM_RESERVE,
                        Memory::PAGE_NOACCESS,
                    );
                    if addr.is_null() {
                        return None;
                    }
                    reservation.base = addr.cast();
                }

                let new_brk = reservation.brk.checked_add(extra)?;
                if new_brk > RESERVE_BYTES {
                    return None;
                }

                // Re-committing already committed pages is allowed, so
                // commit the whole range from the base every time.
                let addr = Memory::VirtualAlloc(
                    Some(reservation.base as *const c_void),
                    new_brk,
                    Memory::MEM_COMMIT,
                    Memory::PAGE_READWRITE,
                );
                if addr.is_null() {
                    return None;
                }

                reservation.brk = new_brk;
                NonNull::new(reservation.base.add(new_brk))
            }
        }
    }

    impl Drop for Reservation {
        fn drop(&mut self) {
            if !self.base.is_null() {
                unsafe {
                    let _ = Memory::VirtualFree(self.base.cast(), 0, Memory::MEM_RELEASE);
                }
            }
        }
    }
}

/// A fixed-capacity slab whose break advances through it.
///
/// The backing memory is taken from the global allocator once, at
/// construction, so every grant is contiguous and the addresses stay put
/// for the slab's lifetime. Growth fails once the capacity is spent,
/// which makes exhaustion behavior easy to provoke. This is the backend
/// every test builds its heaps on, and it is what lets any number of
/// independent heaps coexist in one process.
pub struct FixedBreak {
    base: NonNull<u8>,
    layout: Layout,
    brk: usize,
}

impl FixedBreak {
    /// A slab holding at most `capacity` bytes of arena.
    ///
    /// Panics if `capacity` is zero or too large to lay out.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "fixture heap needs a nonzero capacity");
        let layout = match Layout::from_size_align(capacity, ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => panic!("fixture heap capacity {capacity} is not layoutable"),
        };

        // SAFETY: the layout has nonzero size.
        let base = unsafe { alloc::alloc(layout) };
        let base = match NonNull::new(base) {
            Some(base) => base,
            None => handle_alloc_error(layout),
        };

        Self {
            base,
            layout,
            brk: 0,
        }
    }

    /// Bytes still grantable before the capacity ceiling.
    pub fn remaining(&self) -> usize {
        self.layout.size() - self.brk
    }
}

unsafe impl GrowHeap for FixedBreak {
    fn grow_heap(&mut self, extra: usize) -> Option<NonNull<u8>> {
        let new_brk = self.brk.checked_add(extra)?;
        if new_brk > self.layout.size() {
            return None;
        }
        self.brk = new_brk;

        // SAFETY: new_brk <= capacity, so the offset stays inside the slab.
        unsafe { Some(NonNull::new_unchecked(self.base.as_ptr().add(new_brk))) }
    }
}

impl Drop for FixedBreak {
    fn drop(&mut self) {
        // SAFETY: base came from the global allocator with this layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
    }
}

// The slab is uniquely owned and carries no thread affinity; the heap
// manager serializes all access to it.
unsafe impl Send for FixedBreak {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_are_contiguous() {
        let mut slab = FixedBreak::new(4096);

        let first = slab.grow_heap(1024).unwrap();
        let second = slab.grow_heap(512).unwrap();

        assert_eq!(
            first.as_ptr() as usize + 512,
            second.as_ptr() as usize,
            "second grant must sit directly on top of the first"
        );
        assert_eq!(slab.remaining(), 4096 - 1536);
    }

    #[test]
    fn refuses_past_capacity() {
        let mut slab = FixedBreak::new(2048);

        assert!(slab.grow_heap(2048).is_some());
        assert!(slab.grow_heap(1).is_none());
        assert_eq!(slab.remaining(), 0);
    }

    #[test]
    fn bottom_is_aligned() {
        let mut slab = FixedBreak::new(1024);

        let top = slab.grow_heap(1024).unwrap();
        let bottom = top.as_ptr() as usize - 1024;
        assert_eq!(bottom % ALIGNMENT, 0);
    }
}
