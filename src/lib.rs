//! # dynalloc - A First-Fit Heap Allocator
//!
//! This crate provides a general purpose **first-fit allocator** with lazy
//! coalescing, implemented on top of a single growable heap region such as
//! the process data segment (`sbrk`/`brk`).
//!
//! ## Overview
//!
//! Every block carries a header in front of its data. Headers form a doubly
//! linked list ordered by address, and list neighbours are always physical
//! neighbours:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌────────┬──────────┬────────┬──────┬────────┬───────────────┐
//!   │ Header │   data   │ Header │ data │ Header │     data      │
//!   │  used  │          │  free  │      │  used  │               │
//!   └────────┴──────────┴────────┴──────┴────────┴───────────────┘
//!   ▲                                                            ▲
//!   │                                                            │
//!   Heap start                                           Heap boundary
//! ```
//!
//! - **allocate** walks the list from the head. Free runs are merged as the
//!   walk reaches them; the first block large enough is split and returned.
//!   When nothing fits, the heap grows by one block.
//! - **deallocate** only flips the free flag, except for the tail: then the
//!   whole trailing run of free blocks is handed back to the region.
//! - **reallocate** shrinks in place, grows the tail in place, absorbs free
//!   followers, or moves the data as a last resort.
//!
//! ```text
//!   Header (4 words on 64 bit):
//!   ┌─────────────────┐
//!   │ next: ptr/null  │
//!   │ prev: ptr/null  │
//!   │ size: N         │  ← data bytes only, header excluded
//!   │ free: bool      │
//!   └─────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   dynalloc
//!   ├── align      - Word alignment helpers (align!)
//!   ├── block      - Header layout, merge and split
//!   ├── config     - Allocator tunables (minimum block size)
//!   ├── dynalloc   - The allocator itself
//!   ├── error      - Region and invariant errors
//!   └── region     - Heap regions: program break and mmap arena
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use dynalloc::{Dynalloc, MmapArena};
//!
//! let mut allocator = Dynalloc::new(MmapArena::new(1 << 20).unwrap());
//!
//! unsafe {
//!     let ptr = allocator.allocate(64) as *mut u64;
//!     *ptr = 42;
//!
//!     let ptr = allocator.reallocate(ptr as *mut u8, 256) as *mut u64;
//!     assert_eq!(*ptr, 42);
//!
//!     allocator.deallocate(ptr as *mut u8);
//! }
//!
//! assert!(allocator.is_empty());
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Word alignment only**: Larger alignments are refused
//! - **Unix-only**: Requires `libc` (`sbrk`, `brk`, `mmap`)
//!
//! ## Safety
//!
//! The allocator hands out raw pointers and recovers headers from them, so
//! all allocation operations are `unsafe`. Use
//! [`Dynalloc::deallocate_validated`] when a pointer may not come from the
//! allocator.

pub mod align;
mod block;
mod config;
mod dynalloc;
mod error;
mod region;

pub use block::HEADER_SIZE;
pub use config::{Config, MIN_BLOCK_SIZE};
pub use dynalloc::{BlockInfo, Dynalloc, HeapStats, print_heap};
pub use error::{HeapError, InvariantViolation};
pub use region::{HeapRegion, MmapArena, ProgramBreak};
