//! The block chain living inside a heap's region.
//!
//! Nothing in here locks. Every method assumes the caller holds the heap's
//! mutex, which is what lets `realloc` allocate and release in the same
//! critical section.

use std::ptr::{self, NonNull};

use log::{trace, warn};

use crate::{
  ALIGNMENT,
  block::{BlockInfo, HEADER_SIZE, Header, MIN_SPLIT, NO_NEXT},
  error::{ChainError, InitError},
  stats::HeapStats,
};

/// Offset of the first block.
const HEAD: usize = 0;

pub(crate) struct Arena {
  base: NonNull<u8>,
  len: usize,
}

// The arena is the only handle to its memory, and every access goes
// through the heap's mutex.
unsafe impl Send for Arena {}

impl Arena {
  /// Lays out a single free block over `len` bytes starting at `base`.
  ///
  /// A misaligned `base` is rounded up and `len` shrinks to match.
  ///
  /// # Safety
  ///
  /// `base..base + len` must be writable memory owned by the caller for as
  /// long as the arena is used.
  pub unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Result<Self, InitError> {
    let pad = base.align_offset(ALIGNMENT);
    let usable = len.saturating_sub(pad);
    if usable < MIN_SPLIT {
      return Err(InitError::TooSmall {
        requested: len,
        minimum: MIN_SPLIT + pad,
      });
    }

    let len = usable;
    let mut arena = Self {
      base: unsafe { base.add(pad) },
      len,
    };
    *arena.header_mut(HEAD) = Header::new(crate::align_down!(len - HEADER_SIZE), true, NO_NEXT);

    Ok(arena)
  }

  pub fn len(
    &self,
  ) -> usize {
    self.len
  }

  fn header(
    &self,
    offset: usize,
  ) -> &Header {
    debug_assert!(offset + HEADER_SIZE <= self.len);
    unsafe { &*self.base.as_ptr().add(offset).cast::<Header>() }
  }

  fn header_mut(
    &mut self,
    offset: usize,
  ) -> &mut Header {
    debug_assert!(offset + HEADER_SIZE <= self.len);
    unsafe { &mut *self.base.as_ptr().add(offset).cast::<Header>() }
  }

  fn payload(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    unsafe { self.base.add(offset + HEADER_SIZE) }
  }

  /// Maps a payload pointer back to its block's offset.
  ///
  /// # Safety
  ///
  /// `ptr` must be the payload of a live block of this arena.
  unsafe fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    let offset = unsafe { ptr.offset_from(self.base) } as usize - HEADER_SIZE;
    debug_assert!(offset + HEADER_SIZE <= self.len);
    offset
  }

  /// First free block, in address order, that holds `size` bytes.
  fn find_free_block(
    &self,
    size: usize,
  ) -> Option<usize> {
    let mut current = HEAD;

    loop {
      let header = self.header(current);
      if header.is_free && header.size >= size {
        return Some(current);
      }
      if !header.has_next() {
        return None;
      }
      current = header.next;
    }
  }

  /// Carves a trailing free block off `offset` when the leftover can hold
  /// one. Otherwise the whole block stays as it is.
  fn split_block(
    &mut self,
    offset: usize,
    size: usize,
  ) {
    let header = *self.header(offset);
    if header.size < size + MIN_SPLIT {
      return;
    }

    let remainder = offset + HEADER_SIZE + size;
    *self.header_mut(remainder) = Header::new(header.size - size - HEADER_SIZE, true, header.next);

    let block = self.header_mut(offset);
    block.size = size;
    block.next = remainder;
    trace!("split block {} at {}", offset, remainder);
  }

  /// Marks the first fitting block used and trims it to `size`.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size > self.len {
      warn!("out of memory: {} bytes requested from a {} byte arena", size, self.len);
      return None;
    }
    let size = crate::align!(size);

    let Some(offset) = self.find_free_block(size) else {
      warn!("out of memory: no free block of {} bytes", size);
      return None;
    };

    self.header_mut(offset).is_free = false;
    self.split_block(offset, size);
    trace!("allocated {} bytes at block {}", size, offset);

    Some(self.payload(offset))
  }

  /// Merges every run of neighbouring free blocks.
  fn coalesce(
    &mut self,
  ) {
    let mut current = HEAD;

    loop {
      let header = *self.header(current);
      if !header.has_next() {
        return;
      }

      let next = *self.header(header.next);
      if header.is_free && next.is_free {
        let block = self.header_mut(current);
        block.size += HEADER_SIZE + next.size;
        block.next = next.next;
        trace!("merged block {} into {}", header.next, current);
      } else {
        current = header.next;
      }
    }
  }

  /// Frees the block behind `ptr` and coalesces the chain.
  ///
  /// # Safety
  ///
  /// `ptr` must be the payload of a used block of this arena.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let offset = unsafe { self.offset_of(ptr) };
    self.header_mut(offset).is_free = true;
    trace!("freed block {}", offset);

    self.coalesce();
  }

  /// Recorded payload capacity of the block behind `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must be the payload of a used block of this arena.
  pub unsafe fn capacity_of(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    self.header(unsafe { self.offset_of(ptr) }).size
  }

  /// Grows the block behind `ptr` by moving it. Blocks that already hold
  /// `size` bytes are returned untouched.
  ///
  /// # Safety
  ///
  /// `ptr` must be the payload of a used block of this arena.
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let old_size = unsafe { self.capacity_of(ptr) };
    if old_size >= size {
      return Some(ptr);
    }

    // The old block stays used until the copy is done, so the new one
    // can never overlap it.
    let new_ptr = self.allocate(size)?;
    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
      self.release(ptr);
    }
    trace!("moved {} bytes from {:?} to {:?}", old_size, ptr, new_ptr);

    Some(new_ptr)
  }

  pub fn blocks(
    &self,
  ) -> Blocks<'_> {
    Blocks {
      arena: self,
      next: HEAD,
    }
  }

  /// Walks the chain checking that it tiles the arena, is aligned and is
  /// fully coalesced.
  pub fn verify(
    &self,
  ) -> Result<HeapStats, ChainError> {
    let mut expected = HEAD;
    let mut previous: Option<BlockInfo> = None;

    for block in self.blocks() {
      if block.offset != expected {
        return Err(ChainError::Gap {
          offset: block.offset,
          expected,
        });
      }
      if block.end() > self.len {
        return Err(ChainError::OutOfBounds {
          offset: block.offset,
          end: block.end(),
        });
      }
      if block.size % ALIGNMENT != 0 {
        return Err(ChainError::Misaligned {
          offset: block.offset,
          size: block.size,
        });
      }
      if let Some(prev) = previous
        && prev.is_free
        && block.is_free
      {
        return Err(ChainError::AdjacentFree {
          first: prev.offset,
          second: block.offset,
        });
      }

      expected = block.end();
      previous = Some(block);
    }

    // Only an unsplittable tail may be left uncovered.
    if self.len - expected >= MIN_SPLIT {
      return Err(ChainError::SizeMismatch {
        covered: expected,
        arena: self.len,
      });
    }

    Ok(self.stats())
  }

  pub fn stats(
    &self,
  ) -> HeapStats {
    HeapStats::collect(self.len, self.blocks())
  }
}

/// Iterator over the chain in address order.
pub(crate) struct Blocks<'a> {
  arena: &'a Arena,
  next: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(
    &mut self,
  ) -> Option<Self::Item> {
    if self.next == NO_NEXT {
      return None;
    }

    let offset = self.next;
    // A corrupted link must not walk us out of the arena.
    if offset + HEADER_SIZE > self.arena.len {
      self.next = NO_NEXT;
      return Some(BlockInfo {
        offset,
        size: 0,
        is_free: false,
      });
    }

    let header = self.arena.header(offset);
    self.next = if header.next <= offset { NO_NEXT } else { header.next };

    Some(BlockInfo {
      offset,
      size: header.size,
      is_free: header.is_free,
    })
  }
}
