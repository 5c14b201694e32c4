use std::{env, thread};

use firstfit::{DEFAULT_HEAP_SIZE, Heap, Sbrk};

/// Reads a numeric setting from the environment, falling back to `default`.
fn setting(
  name: &str,
  default: usize,
) -> usize {
  env::var(name)
    .ok()
    .and_then(|value| value.parse().ok())
    .unwrap_or(default)
}

fn report(
  passed: bool,
  what: &str,
) {
  println!("{} {}.", what, if passed { "succeeded" } else { "failed" });
}

fn small_allocations(
  heap: &Heap<Sbrk>,
) {
  println!("Test: Small Allocations");

  let one = heap.alloc(16);
  let two = heap.alloc(32);
  let three = heap.alloc(48);
  report(
    one.is_some() && two.is_some() && three.is_some(),
    "Small allocations",
  );

  unsafe {
    heap.free(one);
    heap.free(two);
    heap.free(three);
  }
}

fn realloc(
  heap: &Heap<Sbrk>,
) {
  println!("Test: Realloc");

  let Some(ptr) = heap.alloc(64) else {
    println!("Initial allocation failed.");
    return;
  };

  let grown = unsafe { heap.realloc(Some(ptr), 128) };
  report(grown.is_some(), "Realloc");

  // A failed realloc leaves the original block live.
  unsafe { heap.free(grown.or(Some(ptr))) };
}

fn coalesce(
  heap: &Heap<Sbrk>,
) {
  println!("Test: Coalesce Free Blocks");

  let one = heap.alloc(64);
  let two = heap.alloc(64);
  unsafe {
    heap.free(one);
    heap.free(two);
  }

  report(heap.verify().is_ok(), "Coalesce");
}

fn multithreading(
  heap: &Heap<Sbrk>,
  threads: usize,
  iterations: usize,
) {
  println!("Test: Multi-Threading");

  thread::scope(|s| {
    for _ in 0..threads {
      s.spawn(|| {
        for i in 0..iterations {
          if let Some(ptr) = heap.alloc(64) {
            unsafe {
              ptr.as_ptr().write_bytes(i as u8, 64);
              heap.free(Some(ptr));
            }
          }
        }
      });
    }
  });

  report(heap.verify().is_ok(), "Multi-threading");
}

fn main() {
  env_logger::init();

  let heap_size = setting("HEAP_SIZE", DEFAULT_HEAP_SIZE);
  let threads = setting("THREADS", 4);
  let iterations = setting("ITERATIONS", 100);

  // The program break is process wide, so the heap is set up before any
  // worker thread exists and torn down after they are joined.
  let heap = match Heap::<Sbrk>::with_region(heap_size) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("Failed to allocate heap memory: {}", err);
      std::process::exit(1);
    }
  };

  small_allocations(&heap);
  realloc(&heap);
  coalesce(&heap);
  multithreading(&heap, threads, iterations);

  println!("Final heap: {}", heap.stats());
  heap.cleanup();
}
