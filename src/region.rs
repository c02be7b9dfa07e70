//! The heap boundary the allocator grows and shrinks.
//!
//! [`ProgramBreak`] drives the real process heap through `sbrk(2)`/`brk(2)`;
//! [`MmapArena`] is a private reservation with its own boundary, so a
//! [`Dynalloc`](crate::Dynalloc) can run without touching the program break.

use core::ptr;

use libc::{c_void, intptr_t};
use log::{trace, warn};

use crate::{align, error::HeapError};

/// A contiguous region whose upper boundary can move.
pub trait HeapRegion {
  /// Moves the boundary up by `n` bytes and returns the previous boundary,
  /// i.e. the start of the new space. The returned address is word aligned.
  ///
  /// # Safety
  ///
  /// The caller owns everything between the returned address and the new
  /// boundary and must not assume anything about its contents.
  unsafe fn grow_by(
    &mut self,
    n: usize,
  ) -> Result<*mut u8, HeapError>;

  /// Moves the boundary to `address`, releasing everything above it.
  ///
  /// # Safety
  ///
  /// Nothing above `address` may still be in use.
  unsafe fn set_boundary(
    &mut self,
    address: *mut u8,
  ) -> Result<(), HeapError>;

  /// Current boundary.
  fn boundary(&self) -> *mut u8;
}

/// The process data segment, moved with `sbrk`/`brk`.
///
/// Only one allocator should drive the program break at a time. Growth by
/// anyone else makes the region discontiguous, which the allocator detects
/// and refuses to build on.
///
/// A growth that starts from an unaligned break pads up to the next word.
/// Moving the boundary back to that aligned start restores the original,
/// unpadded break.
#[derive(Debug, Default)]
pub struct ProgramBreak {
  /// `(aligned start, break before padding)` of the last padded growth.
  padded: Option<(usize, usize)>,
}

impl ProgramBreak {
  pub fn new() -> Self {
    Self::default()
  }
}

impl HeapRegion for ProgramBreak {
  unsafe fn grow_by(
    &mut self,
    n: usize,
  ) -> Result<*mut u8, HeapError> {
    unsafe {
      let current = libc::sbrk(0);
      if current == usize::MAX as *mut c_void {
        warn!("sbrk(0) failed while growing by {} bytes", n);
        return Err(HeapError::OutOfMemory { requested: n });
      }

      // the first growth may start from an unaligned break
      let pad = align!(current as usize) - current as usize;
      let total = n
        .checked_add(pad)
        .filter(|&total| total <= isize::MAX as usize)
        .ok_or(HeapError::OutOfMemory { requested: n })?;

      let previous = libc::sbrk(total as intptr_t);
      if previous == usize::MAX as *mut c_void {
        warn!("sbrk({}) denied", total);
        return Err(HeapError::OutOfMemory { requested: n });
      }

      trace!("program break grew by {} bytes from {:?}", total, previous);
      let start = (previous as *mut u8).add(pad);
      if pad > 0 {
        self.padded = Some((start as usize, previous as usize));
      }
      Ok(start)
    }
  }

  unsafe fn set_boundary(
    &mut self,
    address: *mut u8,
  ) -> Result<(), HeapError> {
    let target = match self.padded {
      Some((start, unpadded)) if start == address as usize => unpadded as *mut u8,
      _ => address,
    };

    if unsafe { libc::brk(target as *mut c_void) } != 0 {
      warn!("brk({:?}) rejected", target);
      return Err(HeapError::BoundaryRejected {
        address: target as usize,
      });
    }
    if target != address {
      self.padded = None;
    }
    trace!("program break moved to {:?}", target);
    Ok(())
  }

  fn boundary(&self) -> *mut u8 {
    unsafe { libc::sbrk(0) as *mut u8 }
  }
}

/// A fixed-capacity simulated heap backed by an anonymous `mmap`.
///
/// The full capacity is reserved up front with `MAP_NORESERVE`; the boundary
/// starts at the base and growth past the capacity fails with
/// [`HeapError::OutOfMemory`].
#[derive(Debug)]
pub struct MmapArena {
  base: *mut u8,
  capacity: usize,
  len: usize,
}

impl MmapArena {
  /// Reserves an arena able to hold at least `capacity` bytes.
  pub fn new(capacity: usize) -> Result<Self, HeapError> {
    let page = page_size();
    let capacity = capacity
      .max(1)
      .checked_next_multiple_of(page)
      .ok_or(HeapError::OutOfMemory { requested: capacity })?;

    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        capacity,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
        -1,
        0,
      )
    };

    if base == libc::MAP_FAILED {
      warn!("mmap of a {} byte arena failed", capacity);
      return Err(HeapError::OutOfMemory { requested: capacity });
    }

    Ok(Self {
      base: base as *mut u8,
      capacity,
      len: 0,
    })
  }

  pub fn base(&self) -> *mut u8 {
    self.base
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes between the base and the boundary.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

impl HeapRegion for MmapArena {
  unsafe fn grow_by(
    &mut self,
    n: usize,
  ) -> Result<*mut u8, HeapError> {
    if self.capacity - self.len < n {
      warn!("arena exhausted: {} of {} bytes used, {} requested", self.len, self.capacity, n);
      return Err(HeapError::OutOfMemory { requested: n });
    }
    let previous = unsafe { self.base.add(self.len) };
    self.len += n;
    trace!("arena grew by {} bytes to {}", n, self.len);
    Ok(previous)
  }

  unsafe fn set_boundary(
    &mut self,
    address: *mut u8,
  ) -> Result<(), HeapError> {
    let offset = (address as usize).wrapping_sub(self.base as usize);
    if (address as usize) < self.base as usize || offset > self.capacity {
      return Err(HeapError::OutOfRange {
        address: address as usize,
      });
    }
    self.len = offset;
    trace!("arena boundary moved to {}", offset);
    Ok(())
  }

  fn boundary(&self) -> *mut u8 {
    self.base.wrapping_add(self.len)
  }
}

impl Drop for MmapArena {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base as *mut c_void, self.capacity);
    }
  }
}

fn page_size() -> usize {
  match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
    size if size > 0 => size as usize,
    _ => 4096,
  }
}
