//! # firstfit - A Thread-Safe First-Fit Heap
//!
//! This crate provides a **first-fit free-list allocator** that manages one
//! fixed region of memory obtained from the operating system, either with
//! `mmap(2)` or by growing the program break with `sbrk(2)`.
//!
//! ## Overview
//!
//! The whole region is tiled by blocks. Each block is a header followed by
//! its payload, and the headers link the blocks together in address order.
//! Free and used blocks share the same chain:
//!
//! ```text
//!   Arena:
//!
//!   ┌────────┬──────────┬────────┬────────┬────────┬────────────────────┐
//!   │ Header │ Payload  │ Header │Payload │ Header │      Payload       │
//!   │ used   │ 64 bytes │ free   │32 bytes│ used   │     ...            │
//!   └────────┴──────────┴────────┴────────┴────────┴────────────────────┘
//!   │ next ──────────────▶ next ──────────▶ next ──▶ (end)
//!   ▲
//!   └── offset 0
//! ```
//!
//! - **Allocation** walks the chain from the start and takes the first free
//!   block that is large enough, splitting off the tail when the leftover
//!   can hold another header plus one aligned word.
//! - **Freeing** flags the block free and merges every pair of neighbouring
//!   free blocks in a single pass over the chain.
//! - **Reallocation** keeps blocks that are already big enough and moves the
//!   rest, all under one acquisition of the heap's lock.
//!
//! ## Crate Structure
//!
//! ```text
//!   firstfit
//!   ├── align      - Alignment macros (align!, align_down!)
//!   ├── block      - Block header layout and public block view
//!   ├── region     - OS memory sources (Mmap, Sbrk)
//!   ├── arena      - Chain search, split, coalesce (internal)
//!   ├── heap       - Heap: the locked public entry points
//!   ├── stats      - HeapStats
//!   └── error      - InitError, ChainError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use firstfit::Heap;
//!
//! let heap = Heap::init(64 * 1024).unwrap();
//!
//! let ptr = heap.alloc(32).unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(0xAA, 32);
//!
//!   let grown = heap.realloc(Some(ptr), 256).unwrap();
//!   assert_eq!(*grown.as_ptr(), 0xAA);
//!
//!   heap.free(Some(grown));
//! }
//!
//! assert!(heap.verify().is_ok());
//! heap.cleanup();
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Header             │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ next: offset    │  │  │                          │  │
//!   │  │ is_free: bool   │  │  │  N bytes, N % 8 == 0     │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │     HEADER_SIZE       │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! ## Limitations
//!
//! - **Fixed size**: the region never grows; a request no free block can
//!   hold fails with `None`.
//! - **Linear cost**: both allocation and freeing walk the chain.
//! - **No misuse detection**: freeing a foreign or already freed pointer
//!   corrupts the chain. [`Heap::verify`] can tell after the fact.
//! - **Unix-only**: requires `libc`.

#[macro_use]
pub mod align;
mod arena;
mod block;
mod error;
mod heap;
mod region;
mod stats;

pub use align::ALIGNMENT;
pub use block::{BlockInfo, HEADER_SIZE, MIN_SPLIT};
pub use error::{ChainError, InitError};
pub use heap::Heap;
pub use region::{Mmap, Region, Sbrk};
pub use stats::HeapStats;

/// Heap size used by the demo harness when none is configured.
pub const DEFAULT_HEAP_SIZE: usize = 1024 * 1024;
