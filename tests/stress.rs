//! Randomized allocate/release/resize churn against a fixture slab, with
//! a full invariant sweep after every single step. The seed is fixed so a
//! failure replays exactly.

use std::ptr::NonNull;
use std::slice;

use brkalloc::{FixedBreak, Heap, HeapConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Live {
    addr: usize,
    size: usize,
    fill: u8,
}

fn check_intact(live: &Live) {
    let bytes = unsafe { slice::from_raw_parts(live.addr as *const u8, live.size) };
    assert!(
        bytes.iter().all(|&byte| byte == live.fill),
        "allocation content was clobbered"
    );
}

#[test]
fn randomized_churn_keeps_invariants() {
    let heap = Heap::with_source(FixedBreak::new(512 * 1024), HeapConfig::new());
    let mut rng = StdRng::seed_from_u64(0x6272_6b61);
    let mut live: Vec<Live> = Vec::new();

    for step in 0..1500u32 {
        let fill = (step % 251 + 1) as u8;
        let roll = rng.gen_range(0..100u32);

        if roll < 55 || live.is_empty() {
            let size = rng.gen_range(1..=700usize);
            match heap.allocate(size) {
                Ok(ptr) => {
                    let bytes = unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) };
                    assert!(
                        bytes.iter().all(|&byte| byte == 0),
                        "recycled block handed out without zeroing"
                    );
                    bytes.fill(fill);
                    live.push(Live {
                        addr: ptr.as_ptr() as usize,
                        size,
                        fill,
                    });
                }
                // The slab may legitimately run dry under churn.
                Err(_) => {}
            }
        } else if roll < 85 {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            check_intact(&victim);
            unsafe { heap.release(NonNull::new(victim.addr as *mut u8).unwrap()) };
        } else {
            let index = rng.gen_range(0..live.len());
            let new_size = rng.gen_range(1..=700usize);
            check_intact(&live[index]);

            let old = NonNull::new(live[index].addr as *mut u8).unwrap();
            match unsafe { heap.resize(Some(old), new_size) } {
                Ok(Some(ptr)) => {
                    let bytes = unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), new_size) };
                    bytes.fill(fill);
                    live[index] = Live {
                        addr: ptr.as_ptr() as usize,
                        size: new_size,
                        fill,
                    };
                }
                Ok(None) => unreachable!("new_size is never zero"),
                // Failed resizes leave the old block untouched.
                Err(_) => {}
            }
        }

        heap.verify();
    }

    for victim in live.drain(..) {
        check_intact(&victim);
        unsafe { heap.release(NonNull::new(victim.addr as *mut u8).unwrap()) };
        heap.verify();
    }

    let stats = heap.stats();
    assert_eq!(stats.used_blocks, 0);
    assert_eq!(
        stats.free_blocks, 1,
        "drained heap did not coalesce back into one hole"
    );
}
