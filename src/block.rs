use std::mem;

use crate::ALIGNMENT;

/// Marks the last block of the chain.
pub(crate) const NO_NEXT: usize = usize::MAX;

/// Bytes of metadata stored in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Smallest remainder worth carving into a block of its own: a header
/// plus one aligned word of payload.
pub const MIN_SPLIT: usize = HEADER_SIZE + ALIGNMENT;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

/// In-place block header.
///
/// `next` is a byte offset from the arena base rather than an address, so
/// a chain can be bounds-checked against the arena it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub(crate) struct Header {
  pub size: usize,
  pub next: usize,
  pub is_free: bool,
}

impl Header {
  pub fn new(
    size: usize,
    is_free: bool,
    next: usize,
  ) -> Self {
    Self { size, next, is_free }
  }

  pub fn has_next(
    &self,
  ) -> bool {
    self.next != NO_NEXT
  }
}

/// Snapshot of one block in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Offset of the header from the start of the arena.
  pub offset: usize,
  /// Usable payload bytes.
  pub size: usize,
  pub is_free: bool,
}

impl BlockInfo {
  /// Offset one past the end of the payload.
  pub fn end(
    &self,
  ) -> usize {
    self.offset.saturating_add(HEADER_SIZE).saturating_add(self.size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_keeps_payloads_aligned() {
    assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
    assert!(HEADER_SIZE >= 2 * mem::size_of::<usize>());
  }

  #[test]
  fn block_end_covers_header_and_payload() {
    let block = BlockInfo {
      offset: 48,
      size: 64,
      is_free: true,
    };

    assert_eq!(block.end(), 48 + HEADER_SIZE + 64);
  }

  #[test]
  fn last_block_has_no_next() {
    assert!(!Header::new(8, true, NO_NEXT).has_next());
    assert!(Header::new(8, true, 32).has_next());
  }
}
