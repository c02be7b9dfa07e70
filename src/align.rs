/// Size of a machine word; every block size is a multiple of it.
pub const WORD: usize = core::mem::size_of::<usize>();

/// Rounds the given size up to the next multiple of the machine word.
///
/// # Examples
///
/// ```rust
/// use dynalloc::align;
///
/// match core::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::WORD - 1) & !($crate::align::WORD - 1)
  };
}

/// Same as [`align!`], but returns `None` instead of wrapping on overflow.
pub fn checked_align(value: usize) -> Option<usize> {
  value.checked_add(WORD - 1).map(|v| v & !(WORD - 1))
}

pub fn is_word_aligned(addr: usize) -> bool {
  addr & (WORD - 1) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    for i in 0..10 {
      for size in (WORD * i + 1)..=(WORD * (i + 1)) {
        assert_eq!(WORD * (i + 1), align!(size));
      }
    }
    assert_eq!(align!(0), 0);
  }

  #[test]
  fn test_checked_align() {
    assert_eq!(checked_align(1), Some(WORD));
    assert_eq!(checked_align(usize::MAX), None);
  }

  #[test]
  fn test_is_word_aligned() {
    assert!(is_word_aligned(0));
    assert!(is_word_aligned(WORD * 3));
    assert!(!is_word_aligned(WORD + 1));
  }
}
