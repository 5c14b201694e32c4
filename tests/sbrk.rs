//! Program break round trips for `Sbrk` heaps.
//!
//! Runs without the default test harness: the break is process wide, and
//! the harness's worker threads allocate through the system allocator,
//! which may move it at any time. Nothing in here allocates between
//! reading the break and checking it.

use firstfit::{Heap, Sbrk};

fn program_break() -> usize {
  unsafe { libc::sbrk(0) as usize }
}

fn cleanup_restores_break() {
  let before = program_break();

  let heap = Heap::<Sbrk>::with_region(64 * 1024).unwrap();
  assert_eq!(program_break(), before + 64 * 1024);

  let one = heap.alloc(64);
  let two = heap.alloc(128);
  assert!(one.is_some() && two.is_some());
  unsafe {
    heap.free(one);
    heap.free(two);
  }
  assert!(heap.verify().is_ok());
  assert_eq!(heap.stats().free_blocks, 1);

  heap.cleanup();
  assert_eq!(program_break(), before);
}

fn moved_break_is_left_alone() {
  let before = program_break();

  let heap = Heap::<Sbrk>::with_region(16 * 1024).unwrap();
  let grown = unsafe { libc::sbrk(4096) } as usize;
  assert_eq!(grown, before + 16 * 1024);

  // Someone else now owns the memory above the heap, so dropping it must
  // not pull the break back under them.
  heap.cleanup();
  assert_eq!(program_break(), before + 16 * 1024 + 4096);

  assert_eq!(unsafe { libc::brk(before as *mut libc::c_void) }, 0);
  assert_eq!(program_break(), before);
}

fn too_small_leaves_break_alone() {
  let before = program_break();

  assert!(Heap::<Sbrk>::with_region(8).is_err());
  assert_eq!(program_break(), before);
}

fn main() {
  cleanup_restores_break();
  moved_break_is_left_alone();
  too_small_leaves_break_alone();

  println!("sbrk: 3 passed");
}
