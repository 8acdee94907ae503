/// Calculates how many header units a request of `nbytes` occupies, counting
/// one extra unit for the block header itself.
///
/// Evaluates to `None` when the computation overflows `usize`.
///
/// # Examples
///
/// ```rust
/// use kralloc::{UNIT, units};
///
/// assert_eq!(units!(0), Some(1));
/// assert_eq!(units!(1), Some(2));
/// assert_eq!(units!(UNIT), Some(2));
/// assert_eq!(units!(UNIT + 1), Some(3));
/// assert_eq!(units!(usize::MAX), None);
/// ```
#[macro_export]
macro_rules! units {
  ($nbytes:expr) => {
    ($nbytes as usize)
      .checked_add($crate::UNIT - 1)
      .map(|padded| padded / $crate::UNIT + 1)
  };
}
