//! Runs the heap manager as the process-wide allocator. See [`Heap`]'s
//! `GlobalAlloc` implementation for the layout rules it enforces.

use brkalloc::Heap;
use std::thread;

#[global_allocator]
static ALLOCATOR: Heap = Heap::new();

fn main() {
    // Box example
    let val_box = Box::new(22);
    println!("Box Value: {}, At: {:p}", val_box, val_box);

    // Vec example
    let mut v = Vec::new();
    for i in 0..5 {
        v.push(i * 10);
        println!("Added {}; Capacity: {}; At: {:p}", v[i], v.capacity(), v.as_ptr());
    }

    // String example
    let msg = String::from("Heap Testing");
    println!("String '{}' - At: {:p}", msg, msg.as_ptr());

    // Reuse example: freeing and reallocating the same shape should come
    // back at the same address.
    let p1 = Box::new(2.22);
    let addr_p1 = format!("{:p}", p1);
    println!("P1 Allocated at: {addr_p1}");

    drop(p1);
    println!("P1 Deallocated");

    let p2 = Box::new(2.22);
    println!("P2 at: {:p}", p2);

    // Merge example: two adjacent freed blocks should be able to host
    // one larger allocation.
    let a = Box::new([0u8; 64]);
    let b = Box::new([0u8; 64]);
    let ptr_a = a.as_ptr();

    drop(a);
    drop(b);

    let c = Box::new([0u8; 128]);
    let ptr_c = c.as_ptr();

    if ptr_a == ptr_c {
        println!("Correctly reused at {ptr_c:p}");
    } else {
        println!("Not reused. A was at {ptr_a:p} and C is at {ptr_c:p}");
    }

    // Thread example: every spawned thread allocates through the same
    // manager.
    let t1 = thread::spawn(|| {
        let _ = Box::new(222);
    });

    let t2 = thread::spawn(|| {
        let _ = Box::new(222);
    });

    t1.join().unwrap();
    t2.join().unwrap();
}
