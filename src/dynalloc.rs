use core::{alloc::Layout, iter, ptr::{self, NonNull}};

use log::{debug, warn};

use crate::{
  align::{self, WORD},
  block::{self, HEADER_SIZE, Header},
  config::Config,
  error::{HeapError, InvariantViolation},
  region::HeapRegion,
};

/// A snapshot of one block, as seen by [`Dynalloc::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub header: *mut u8,
  pub data: *mut u8,
  pub size: usize,
  pub free: bool,
}

/// Aggregate counters over the whole directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub used_bytes: usize,
  pub free_bytes: usize,
  /// Header and data bytes of every tracked block.
  pub heap_bytes: usize,
}

/// First-fit allocator with lazy coalescing over a growable [`HeapRegion`].
///
/// The allocator owns its region and the head of the block directory; there
/// is no process-wide state. It is not thread safe.
pub struct Dynalloc<R: HeapRegion> {
  region: R,
  first: *mut Header,
  config: Config,
}

impl<R: HeapRegion> Dynalloc<R> {
  pub fn new(region: R) -> Self {
    Self::with_config(region, Config::default())
  }

  pub fn with_config(
    region: R,
    config: Config,
  ) -> Self {
    Self {
      region,
      first: ptr::null_mut(),
      config,
    }
  }

  pub fn region(&self) -> &R {
    &self.region
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// `true` while no block is tracked.
  pub fn is_empty(&self) -> bool {
    self.first.is_null()
  }

  /// Rounds a request up to a word and clamps it to the floor.
  fn block_size(
    &self,
    size: usize,
  ) -> Option<usize> {
    align::checked_align(size.max(self.config.min_block_size()))
  }

  fn headers(&self) -> impl Iterator<Item = *mut Header> + '_ {
    iter::successors(NonNull::new(self.first), |header| {
      NonNull::new(unsafe { (*header.as_ptr()).next })
    })
    .map(NonNull::as_ptr)
  }

  /// Allocates at least `size` bytes and returns a pointer to them, or null
  /// when the heap cannot grow.
  ///
  /// The directory is scanned first fit from the head. Runs of free blocks
  /// are coalesced as the scan reaches them; a fitting block is split so
  /// only the requested amount stays in use.
  ///
  /// # Safety
  ///
  /// The allocator must be the only user of its region's boundary.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let Some(size) = self.block_size(size) else {
      warn!("allocation of {} bytes overflows", size);
      return ptr::null_mut();
    };
    let floor = self.config.min_block_size();

    unsafe {
      let mut current = self.first;
      let mut last = ptr::null_mut();

      while !current.is_null() {
        while (*current).free && !(*current).next.is_null() && (*(*current).next).free {
          block::merge(current, (*current).next);
        }

        if (*current).free && (*current).size >= size {
          block::split(current, size, floor);
          (*current).free = false;
          debug!("allocate({}) reused {:?} holding {} bytes", size, current, (*current).size);
          return Header::data(current);
        }

        last = current;
        current = (*current).next;
      }

      match self.append(size, last) {
        Ok(header) => {
          debug!("allocate({}) grew the heap, new tail {:?}", size, header);
          Header::data(header)
        },
        Err(err) => {
          warn!("allocate({}) failed: {}", size, err);
          ptr::null_mut()
        },
      }
    }
  }

  /// Grows the region by one block and links it after `last`.
  unsafe fn append(
    &mut self,
    size: usize,
    last: *mut Header,
  ) -> Result<*mut Header, HeapError> {
    let total = size
      .checked_add(HEADER_SIZE)
      .ok_or(HeapError::OutOfMemory { requested: size })?;

    unsafe {
      let address = self.region.grow_by(total)?;
      if !last.is_null() {
        contiguous(Header::end(last), address)?;
      }

      let header = Header::write(address, size, false, last, ptr::null_mut());
      if last.is_null() {
        self.first = header;
      } else {
        (*last).next = header;
      }
      Ok(header)
    }
  }

  /// Allocates for a `Layout`. Alignments above one machine word are not
  /// supported and yield null.
  ///
  /// # Safety
  ///
  /// See [`Dynalloc::allocate`].
  pub unsafe fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > WORD {
      warn!("alignment {} exceeds the machine word", layout.align());
      return ptr::null_mut();
    }
    unsafe { self.allocate(layout.size()) }
  }

  /// Marks the block behind `ptr` free. Null is ignored.
  ///
  /// When the block is the tail, the trailing run of free blocks is handed
  /// back to the region. Other free neighbours are left for the next
  /// allocation scan to coalesce.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }
    unsafe { self.release(Header::from_data(ptr)) }
  }

  /// Like [`Dynalloc::deallocate`], but first checks that `ptr` belongs to a
  /// tracked block. Unknown pointers are ignored without touching any state.
  ///
  /// # Safety
  ///
  /// The block behind `ptr`, if tracked, must not be referenced afterwards.
  pub unsafe fn deallocate_validated(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    let header = Header::from_data(ptr);
    if !self.headers().any(|tracked| tracked == header) {
      warn!("ignoring free of untracked pointer {:?}", ptr);
      return;
    }
    unsafe { self.release(header) }
  }

  unsafe fn release(
    &mut self,
    header: *mut Header,
  ) {
    unsafe {
      (*header).free = true;
      if !(*header).next.is_null() {
        debug!("freed {:?} ({} bytes)", header, (*header).size);
        return;
      }

      let mut start = header;
      while !(*start).prev.is_null() && (*(*start).prev).free {
        start = (*start).prev;
      }

      // someone else grew the region past our tail
      if let Err(err) = contiguous(Header::end(header), self.region.boundary()) {
        warn!("keeping trailing blocks from {:?}: {}", start, err);
        return;
      }

      if let Err(err) = self.region.set_boundary(start as *mut u8) {
        // the run stays linked as free blocks
        warn!("could not release trailing blocks from {:?}: {}", start, err);
        return;
      }

      let prev = (*start).prev;
      if prev.is_null() {
        self.first = ptr::null_mut();
      } else {
        (*prev).next = ptr::null_mut();
      }
      debug!("freed tail {:?}, heap boundary back at {:?}", header, start);
    }
  }

  /// Resizes the block behind `ptr` to hold at least `new_size` bytes.
  ///
  /// In order of preference: shrink in place, grow the heap when the block
  /// is the tail, absorb free blocks that follow, or move the data to a fresh
  /// block. Returns null for a null `ptr` and when no memory is available;
  /// the original block is then left as it was.
  ///
  /// A shrink whose remainder would fall below the floor keeps the larger
  /// size; [`Dynalloc::usable_size`] reports what the block really holds.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    new_size: usize,
  ) -> *mut u8 {
    if ptr.is_null() {
      debug!("reallocate of a null pointer");
      return ptr::null_mut();
    }
    let Some(new_size) = self.block_size(new_size) else {
      warn!("reallocation to {} bytes overflows", new_size);
      return ptr::null_mut();
    };
    let floor = self.config.min_block_size();

    unsafe {
      let header = Header::from_data(ptr);
      let old_size = (*header).size;

      if new_size <= old_size {
        if new_size < old_size && block::split(header, new_size, floor).is_none() {
          debug!("shrink of {:?} to {} bytes keeps {} bytes", header, new_size, old_size);
        }
        return ptr;
      }

      let delta = new_size - old_size;
      let next = (*header).next;

      if next.is_null() {
        let grown = self
          .region
          .grow_by(delta)
          .and_then(|address| contiguous(Header::end(header), address));
        return match grown {
          Ok(()) => {
            (*header).size = new_size;
            debug!("grew tail {:?} in place to {} bytes", header, new_size);
            ptr
          },
          Err(err) => {
            warn!("reallocate({}) of the tail failed: {}", new_size, err);
            ptr::null_mut()
          },
        };
      }

      if (*next).free {
        while !(*next).next.is_null() && (*(*next).next).free {
          block::merge(next, (*next).next);
        }

        // absorbing `next` also frees up its header
        if HEADER_SIZE + (*next).size >= delta {
          block::split(next, delta.saturating_sub(HEADER_SIZE), floor);
          block::merge(header, next);
          debug!("grew {:?} in place to {} bytes", header, (*header).size);
          return ptr;
        }
      }

      let fresh = self.allocate(new_size);
      if fresh.is_null() {
        return ptr::null_mut();
      }
      ptr::copy_nonoverlapping(ptr, fresh, old_size);
      self.deallocate(ptr);
      debug!("moved {:?} to {:?} for {} bytes", ptr, fresh, new_size);
      fresh
    }
  }

  /// Data bytes actually held by the block behind `ptr`; 0 for null.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: *mut u8,
  ) -> usize {
    if ptr.is_null() {
      return 0;
    }
    unsafe { (*Header::from_data(ptr)).size }
  }

  /// Walks the directory in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.headers().map(|header| unsafe {
      BlockInfo {
        header: header as *mut u8,
        data: Header::data(header),
        size: (*header).size,
        free: (*header).free,
      }
    })
  }

  pub fn stats(&self) -> HeapStats {
    self.blocks().fold(HeapStats::default(), |mut stats, block| {
      stats.blocks += 1;
      stats.heap_bytes += HEADER_SIZE + block.size;
      if block.free {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      } else {
        stats.used_bytes += block.size;
      }
      stats
    })
  }

  /// Verifies the directory: word-aligned headers, sizes at or above the
  /// floor, back links, physical adjacency of neighbours, and a heap
  /// boundary sitting exactly at the tail's end.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    let floor = self.config.min_block_size();
    let mut prev: *mut Header = ptr::null_mut();

    for header in self.headers() {
      let address = header as usize;
      unsafe {
        if !align::is_word_aligned(address) {
          return Err(InvariantViolation::Misaligned { header: address });
        }
        if (*header).size < floor {
          return Err(InvariantViolation::BelowFloor {
            header: address,
            size: (*header).size,
            floor,
          });
        }
        if (*header).prev != prev {
          return Err(InvariantViolation::BrokenBackLink { header: address });
        }
        if !prev.is_null() && Header::end(prev) as usize != address {
          return Err(InvariantViolation::NotAdjacent {
            header: prev as usize,
            next: address,
            expected: Header::end(prev) as usize,
          });
        }
      }
      prev = header;
    }

    if !prev.is_null() {
      let tail_end = unsafe { Header::end(prev) } as usize;
      let boundary = self.region.boundary() as usize;
      if tail_end != boundary {
        return Err(InvariantViolation::BoundaryMismatch { boundary, tail_end });
      }
    }
    Ok(())
  }
}

/// Fails unless the region handed out space right at `expected`.
fn contiguous(
  expected: *mut u8,
  actual: *mut u8,
) -> Result<(), HeapError> {
  if expected != actual {
    warn!("heap region is no longer contiguous: expected {:?}, got {:?}", expected, actual);
    return Err(HeapError::Discontiguous {
      expected: expected as usize,
      actual: actual as usize,
    });
  }
  Ok(())
}

/// Prints every block of `allocator` followed by the heap boundary.
pub fn print_heap<R: HeapRegion>(allocator: &Dynalloc<R>) {
  for (i, block) in allocator.blocks().enumerate() {
    println!(
      "  #{:<3} header = {:?}, data = {:?}, size = {:>6}, {}",
      i,
      block.header,
      block.data,
      block.size,
      if block.free { "free" } else { "used" }
    );
  }
  println!("  heap boundary = {:?}", allocator.region().boundary());
}
