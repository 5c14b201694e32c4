/// Every payload capacity handed out by the heap is a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Rounds a size up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use firstfit::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(64), 64);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::ALIGNMENT - 1) & !($crate::ALIGNMENT - 1)
  };
}

/// Rounds a size down to a multiple of [`ALIGNMENT`].
#[macro_export]
macro_rules! align_down {
  ($value:expr) => {
    $value & !($crate::ALIGNMENT - 1)
  };
}
