use std::{error, fmt, io};

/// Why a heap could not be brought up.
#[derive(Debug)]
pub enum InitError {
  /// The requested arena cannot hold even one header and one aligned word.
  TooSmall { requested: usize, minimum: usize },
  /// The operating system refused to hand out the region.
  RegionUnavailable { requested: usize, source: io::Error },
}

impl fmt::Display for InitError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      InitError::TooSmall { requested, minimum } => write!(
        f,
        "heap of {} bytes is too small, at least {} bytes are needed",
        requested, minimum
      ),
      InitError::RegionUnavailable { requested, source } => write!(
        f,
        "failed to acquire {} bytes of heap memory: {}",
        requested, source
      ),
    }
  }
}

impl error::Error for InitError {
  fn source(
    &self,
  ) -> Option<&(dyn error::Error + 'static)> {
    match self {
      InitError::RegionUnavailable { source, .. } => Some(source),
      InitError::TooSmall { .. } => None,
    }
  }
}

/// A broken invariant found while walking the block chain.
///
/// The heap never produces these on its own; they surface when a caller
/// violated the pointer contract of `free`/`realloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
  /// A block does not start where its predecessor ends.
  Gap { offset: usize, expected: usize },
  /// A block header or payload reaches past the end of the arena.
  OutOfBounds { offset: usize, end: usize },
  /// A payload capacity is not a multiple of the alignment.
  Misaligned { offset: usize, size: usize },
  /// Two neighbouring blocks are both free.
  AdjacentFree { first: usize, second: usize },
  /// The chain does not account for the whole arena.
  SizeMismatch { covered: usize, arena: usize },
}

impl fmt::Display for ChainError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match *self {
      ChainError::Gap { offset, expected } => {
        write!(f, "block at {} should start at {}", offset, expected)
      }
      ChainError::OutOfBounds { offset, end } => {
        write!(f, "block at {} ends at {}, past the arena", offset, end)
      }
      ChainError::Misaligned { offset, size } => {
        write!(f, "block at {} has unaligned capacity {}", offset, size)
      }
      ChainError::AdjacentFree { first, second } => {
        write!(f, "free blocks at {} and {} were not coalesced", first, second)
      }
      ChainError::SizeMismatch { covered, arena } => {
        write!(f, "chain covers {} of {} arena bytes", covered, arena)
      }
    }
  }
}

impl error::Error for ChainError {}

#[cfg(test)]
mod tests {
  use std::error::Error;

  use super::*;

  #[test]
  fn region_error_exposes_os_cause() {
    let err = InitError::RegionUnavailable {
      requested: 4096,
      source: io::Error::from_raw_os_error(libc::ENOMEM),
    };

    assert!(err.to_string().starts_with("failed to acquire 4096 bytes"));
    assert!(err.source().is_some());
  }

  #[test]
  fn too_small_has_no_cause() {
    let err = InitError::TooSmall {
      requested: 4,
      minimum: 32,
    };

    assert!(err.source().is_none());
    assert!(err.to_string().contains("at least 32 bytes"));
  }
}
