//! Address space handed to a heap by the operating system.

use std::{io, ptr::NonNull};

use libc::{c_void, intptr_t};
use log::{debug, warn};

use crate::error::InitError;

/// A contiguous range of fresh memory owned by exactly one heap.
///
/// Dropping the region gives it back to the operating system.
///
/// # Safety
///
/// `as_ptr()..as_ptr() + len()` must stay readable, writable and unused
/// by anything else until the region is dropped.
pub unsafe trait Region: Sized {
  /// Requests `len` bytes of fresh address space.
  fn acquire(
    len: usize,
  ) -> Result<Self, InitError>;

  fn as_ptr(
    &self,
  ) -> NonNull<u8>;

  fn len(
    &self,
  ) -> usize;
}

/// Anonymous private mapping. Any number of these can coexist.
#[derive(Debug)]
pub struct Mmap {
  base: NonNull<u8>,
  len: usize,
}

// Only the address is shared; the heap's lock serializes access to the
// bytes behind it.
unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

unsafe impl Region for Mmap {
  fn acquire(
    len: usize,
  ) -> Result<Self, InitError> {
    let addr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == libc::MAP_FAILED {
      return Err(InitError::RegionUnavailable {
        requested: len,
        source: io::Error::last_os_error(),
      });
    }

    let base = NonNull::new(addr.cast::<u8>()).ok_or(InitError::RegionUnavailable {
      requested: len,
      source: io::Error::from_raw_os_error(libc::ENOMEM),
    })?;
    debug!("mapped {} bytes at {:?}", len, base);

    Ok(Self { base, len })
  }

  fn as_ptr(
    &self,
  ) -> NonNull<u8> {
    self.base
  }

  fn len(
    &self,
  ) -> usize {
    self.len
  }
}

impl Drop for Mmap {
  fn drop(
    &mut self,
  ) {
    let rc = unsafe { libc::munmap(self.base.as_ptr().cast::<c_void>(), self.len) };
    if rc != 0 {
      warn!(
        "munmap of {} bytes at {:?} failed: {}",
        self.len,
        self.base,
        io::Error::last_os_error()
      );
    } else {
      debug!("unmapped {} bytes at {:?}", self.len, self.base);
    }
  }
}

/// Memory carved off the top of the program break with `sbrk(2)`.
///
/// The break is process wide: only one `Sbrk` region should be alive at a
/// time, and it must be acquired and dropped while no other code moves the
/// break.
#[derive(Debug)]
pub struct Sbrk {
  base: NonNull<u8>,
  len: usize,
}

unsafe impl Send for Sbrk {}
unsafe impl Sync for Sbrk {}

unsafe impl Region for Sbrk {
  fn acquire(
    len: usize,
  ) -> Result<Self, InitError> {
    let failed = || InitError::RegionUnavailable {
      requested: len,
      source: io::Error::last_os_error(),
    };

    let increment = intptr_t::try_from(len).map_err(|_| InitError::RegionUnavailable {
      requested: len,
      source: io::Error::from_raw_os_error(libc::ENOMEM),
    })?;

    let addr = unsafe { libc::sbrk(increment) };
    if addr == usize::MAX as *mut c_void {
      return Err(failed());
    }

    let base = NonNull::new(addr.cast::<u8>()).ok_or_else(failed)?;
    debug!("program break grown by {} bytes from {:?}", len, base);

    Ok(Self { base, len })
  }

  fn as_ptr(
    &self,
  ) -> NonNull<u8> {
    self.base
  }

  fn len(
    &self,
  ) -> usize {
    self.len
  }
}

impl Drop for Sbrk {
  fn drop(
    &mut self,
  ) {
    let end = unsafe { self.base.as_ptr().add(self.len) };
    let current = unsafe { libc::sbrk(0) };

    // Shrinking past memory someone else grew would unmap it under them.
    if current.cast::<u8>() != end {
      warn!(
        "program break moved to {:?} since {:?}, leaking {} bytes",
        current, end, self.len
      );
      return;
    }

    if unsafe { libc::brk(self.base.as_ptr().cast::<c_void>()) } != 0 {
      warn!(
        "failed to reset program break to {:?}: {}",
        self.base,
        io::Error::last_os_error()
      );
    } else {
      debug!("program break reset to {:?}", self.base);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mmap_region_is_writable() {
    let region = Mmap::acquire(4096).unwrap();
    assert_eq!(region.len(), 4096);

    unsafe {
      region.as_ptr().as_ptr().write_bytes(0x5A, region.len());
      assert_eq!(*region.as_ptr().as_ptr().add(4095), 0x5A);
    }
  }

  #[test]
  fn mmap_regions_do_not_overlap() {
    let one = Mmap::acquire(8192).unwrap();
    let two = Mmap::acquire(8192).unwrap();

    let one_range = one.as_ptr().addr().get()..one.as_ptr().addr().get() + one.len();
    assert!(!one_range.contains(&two.as_ptr().addr().get()));
  }

  #[test]
  fn mmap_refuses_absurd_sizes() {
    let err = Mmap::acquire(usize::MAX / 2).unwrap_err();
    assert!(matches!(err, InitError::RegionUnavailable { .. }));
  }
}
