use std::{
  alloc::{GlobalAlloc, Layout},
  fmt,
  ptr::{self, NonNull},
};

use log::{debug, error, trace};
use spin::Mutex;

use crate::{
  ALIGNMENT,
  arena::Arena,
  block::{BlockInfo, MIN_SPLIT},
  error::{ChainError, InitError},
  region::{Mmap, Region},
  stats::HeapStats,
};

/// A first-fit heap over one region of OS memory.
///
/// Every public method takes the lock exactly once. Dropping the heap (or
/// calling [`Heap::cleanup`]) hands the region back to the OS, which
/// invalidates every pointer it gave out.
///
/// The lock is a spin lock. Critical sections are one chain walk long, but
/// a thread preempted while holding it leaves every other caller spinning
/// until it is scheduled again.
pub struct Heap<R: Region = Mmap> {
  arena: Mutex<Arena>,
  region: R,
}

impl Heap {
  /// Maps a fresh `total_size` byte region and lays one free block over it.
  pub fn init(
    total_size: usize,
  ) -> Result<Self, InitError> {
    Self::with_region(total_size)
  }
}

impl<R: Region> Heap<R> {
  /// Like [`Heap::init`], with the memory coming from `R`.
  pub fn with_region(
    total_size: usize,
  ) -> Result<Self, InitError> {
    if total_size < MIN_SPLIT {
      let err = InitError::TooSmall {
        requested: total_size,
        minimum: MIN_SPLIT,
      };
      error!("heap init failed: {}", err);
      return Err(err);
    }

    let region = R::acquire(total_size).inspect_err(|err| error!("heap init failed: {}", err))?;

    let arena = unsafe { Arena::new(region.as_ptr(), region.len()) }
      .inspect_err(|err| error!("heap init failed: {}", err))?;
    debug!(
      "heap of {} bytes ready at {:?} ({} usable)",
      total_size,
      region.as_ptr(),
      arena.len()
    );

    Ok(Self {
      arena: Mutex::new(arena),
      region,
    })
  }

  /// Returns a pointer to at least `size` bytes, aligned to [`ALIGNMENT`],
  /// or `None` when no free block is large enough.
  pub fn alloc(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.arena.lock().allocate(size)
  }

  /// Gives a block back to the heap. `None` is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must have come from [`Heap::alloc`] or [`Heap::realloc`] on this
  /// heap and must not have been freed since.
  pub unsafe fn free(
    &self,
    ptr: Option<NonNull<u8>>,
  ) {
    let Some(ptr) = ptr else {
      return;
    };

    unsafe { self.arena.lock().release(ptr) }
  }

  /// Makes the block behind `ptr` hold at least `size` bytes.
  ///
  /// Blocks that are already large enough are returned as they are; there
  /// is no shrinking. Growing moves the contents to a new block. On failure
  /// `None` is returned and the old block is left untouched.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::free`].
  pub unsafe fn realloc(
    &self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let mut arena = self.arena.lock();

    match ptr {
      None => arena.allocate(size),
      Some(ptr) => unsafe { arena.reallocate(ptr, size) },
    }
  }

  /// Recorded capacity of the block behind `ptr`.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::free`].
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { self.arena.lock().capacity_of(ptr) }
  }

  /// Returns the region to the operating system.
  pub fn cleanup(
    self,
  ) {
    trace!("cleaning up heap: {}", self.stats());
    drop(self);
  }

  /// Bytes under management.
  pub fn capacity(
    &self,
  ) -> usize {
    self.arena.lock().len()
  }

  /// Snapshot of the block chain in address order.
  pub fn blocks(
    &self,
  ) -> Vec<BlockInfo> {
    self.arena.lock().blocks().collect()
  }

  pub fn stats(
    &self,
  ) -> HeapStats {
    self.arena.lock().stats()
  }

  /// Checks that the chain tiles the arena, every capacity is aligned and
  /// no two neighbouring blocks are free.
  pub fn verify(
    &self,
  ) -> Result<HeapStats, ChainError> {
    self.arena.lock().verify()
  }
}

impl<R: Region> fmt::Debug for Heap<R> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Heap")
      .field("base", &self.region.as_ptr())
      .field("stats", &self.stats())
      .finish()
  }
}

/// Serves layouts aligned to at most [`ALIGNMENT`]; stricter alignments get
/// a null pointer.
///
/// Meant for driving a `Heap` through `Layout`s, not for
/// `#[global_allocator]`: a heap cannot be built in a `static`, and the
/// `log` calls made under the lock would re-enter it through any logger
/// that allocates.
unsafe impl<R: Region> GlobalAlloc for Heap<R> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    Heap::alloc(self, layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { Heap::free(self, NonNull::new(ptr)) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { Heap::realloc(self, NonNull::new(ptr), new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}
