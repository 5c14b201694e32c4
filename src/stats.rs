use std::fmt;

use crate::block::{BlockInfo, HEADER_SIZE};

/// Totals gathered from one walk of the block chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes managed by the heap.
  pub arena: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes handed out to callers.
  pub used_bytes: usize,
  /// Payload bytes available for allocation.
  pub free_bytes: usize,
  /// Largest single request that would currently succeed.
  pub largest_free: usize,
  /// Bytes spent on headers.
  pub overhead: usize,
}

impl HeapStats {
  pub(crate) fn collect(
    arena: usize,
    blocks: impl Iterator<Item = BlockInfo>,
  ) -> Self {
    blocks.fold(
      HeapStats {
        arena,
        ..Default::default()
      },
      |mut stats, block| {
        stats.blocks += 1;
        stats.overhead += HEADER_SIZE;
        if block.is_free {
          stats.free_blocks += 1;
          stats.free_bytes += block.size;
          stats.largest_free = stats.largest_free.max(block.size);
        } else {
          stats.used_bytes += block.size;
        }
        stats
      },
    )
  }

  /// Bytes covered by the chain, headers included.
  pub fn covered(
    &self,
  ) -> usize {
    self.overhead + self.used_bytes + self.free_bytes
  }
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "{} blocks ({} free), {} used / {} free / {} overhead of {} bytes",
      self.blocks, self.free_blocks, self.used_bytes, self.free_bytes, self.overhead, self.arena
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn totals_add_up() {
    let blocks = [
      BlockInfo {
        offset: 0,
        size: 64,
        is_free: false,
      },
      BlockInfo {
        offset: HEADER_SIZE + 64,
        size: 128,
        is_free: true,
      },
      BlockInfo {
        offset: 2 * HEADER_SIZE + 192,
        size: 32,
        is_free: true,
      },
    ];

    let stats = HeapStats::collect(4096, blocks.into_iter());

    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.used_bytes, 64);
    assert_eq!(stats.free_bytes, 160);
    assert_eq!(stats.largest_free, 128);
    assert_eq!(stats.covered(), 3 * HEADER_SIZE + 224);
  }
}
