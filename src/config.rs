use crate::align::{self, WORD};

/// Default floor for a block's data region, in bytes.
pub const MIN_BLOCK_SIZE: usize = 32;

/// Tunables for a [`Dynalloc`](crate::Dynalloc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  min_block_size: usize,
}

impl Config {
  /// Sets the smallest data region any block may have. The value is rounded
  /// up to a word and never drops below one word.
  pub fn with_min_block_size(
    mut self,
    min_block_size: usize,
  ) -> Self {
    self.min_block_size = align::checked_align(min_block_size.max(WORD))
      .unwrap_or(usize::MAX & !(WORD - 1));
    self
  }

  pub fn min_block_size(&self) -> usize {
    self.min_block_size
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      min_block_size: MIN_BLOCK_SIZE,
    }
  }
}
