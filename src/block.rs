use core::{mem, ptr::NonNull};

use log::trace;

use crate::align::WORD;

/// Block metadata. Sits immediately before the block's data region.
///
/// Headers form a doubly linked list ordered by address in which list
/// neighbours are also physical neighbours: `next` always starts at this
/// block's data end.
#[repr(C)]
pub struct Header {
  pub next: *mut Header,
  pub prev: *mut Header,
  /// Length of the data region, header excluded.
  pub size: usize,
  pub free: bool,
}

/// Bytes of overhead each block pays for its header.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

const _: () = assert!(HEADER_SIZE % WORD == 0);
const _: () = assert!(mem::align_of::<Header>() <= WORD);

impl Header {
  /// Writes a fresh header at `at` and returns it.
  ///
  /// # Safety
  ///
  /// `at` must be word aligned and valid for writes of [`HEADER_SIZE`] bytes.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
    free: bool,
    prev: *mut Header,
    next: *mut Header,
  ) -> *mut Header {
    let header = at as *mut Header;
    unsafe {
      header.write(Header { next, prev, size, free });
    }
    header
  }

  /// Start of the data region owned by `header`.
  pub fn data(header: *mut Header) -> *mut u8 {
    header.wrapping_add(1) as *mut u8
  }

  /// Recovers the header that precedes a data pointer.
  ///
  /// The result is only meaningful for pointers handed out by the allocator.
  pub fn from_data(data: *mut u8) -> *mut Header {
    data.wrapping_sub(HEADER_SIZE) as *mut Header
  }

  /// One past the last data byte of `header`.
  ///
  /// # Safety
  ///
  /// `header` must point to a live header.
  pub unsafe fn end(header: *mut Header) -> *mut u8 {
    unsafe { Header::data(header).add((*header).size) }
  }
}

/// Absorbs `second` into `first`, returning `first`.
///
/// `first.free` is left as it was, so an in-use block can swallow a free
/// neighbour and stay in use.
///
/// # Safety
///
/// Both headers must be live, `second` must directly follow `first` in the
/// directory and in memory, and `second` must be free.
pub unsafe fn merge(
  first: *mut Header,
  second: *mut Header,
) -> *mut Header {
  unsafe {
    debug_assert_eq!((*first).next, second);
    debug_assert!((*second).free);
    trace!(
      "merge {:?} ({} bytes) with {:?} ({} bytes)",
      first,
      (*first).size,
      second,
      (*second).size
    );

    (*first).size += HEADER_SIZE + (*second).size;
    (*first).next = (*second).next;
    if !(*first).next.is_null() {
      (*(*first).next).prev = first;
    }
  }
  first
}

/// Truncates `header` to `size` bytes and turns the rest of its data region
/// into a new free block linked right after it.
///
/// Returns `None` and leaves `header` untouched when the remainder would hold
/// fewer than `floor` bytes.
///
/// # Safety
///
/// `header` must be live and `size` must be word aligned.
pub unsafe fn split(
  header: *mut Header,
  size: usize,
  floor: usize,
) -> Option<NonNull<Header>> {
  unsafe {
    let remainder = (*header)
      .size
      .checked_sub(size)
      .and_then(|rest| rest.checked_sub(HEADER_SIZE))
      .filter(|&rest| rest >= floor)?;

    let next = (*header).next;
    let at = Header::data(header).add(size);
    let new_header = Header::write(at, remainder, true, header, next);
    if !next.is_null() {
      (*next).prev = new_header;
    }
    (*header).next = new_header;
    (*header).size = size;

    trace!(
      "split {:?} at {} bytes, remainder {:?} holds {} bytes",
      header,
      size,
      new_header,
      remainder
    );
    NonNull::new(new_header)
  }
}
