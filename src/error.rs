use thiserror::Error;

/// Failures reported by a [`HeapRegion`](crate::HeapRegion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("heap growth of {requested} bytes denied")]
  OutOfMemory { requested: usize },

  #[error("heap boundary could not be moved to {address:#x}")]
  BoundaryRejected { address: usize },

  #[error("address {address:#x} lies outside the heap region")]
  OutOfRange { address: usize },

  #[error("heap grew at {actual:#x}, expected {expected:#x}")]
  Discontiguous { expected: usize, actual: usize },
}

/// A broken directory invariant, reported by
/// [`Dynalloc::check_invariants`](crate::Dynalloc::check_invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
  #[error("header {header:#x} is not word aligned")]
  Misaligned { header: usize },

  #[error("header {header:#x} holds {size} bytes, below the {floor} byte floor")]
  BelowFloor { header: usize, size: usize, floor: usize },

  #[error("header {next:#x} does not start where {header:#x} ends ({expected:#x})")]
  NotAdjacent { header: usize, next: usize, expected: usize },

  #[error("header {header:#x} has a back link that does not point at its predecessor")]
  BrokenBackLink { header: usize },

  #[error("heap boundary {boundary:#x} does not match the tail end {tail_end:#x}")]
  BoundaryMismatch { boundary: usize, tail_end: usize },
}
