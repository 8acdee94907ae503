//! # kralloc - An Explicit Free-List Heap Allocator
//!
//! This crate provides a **next-fit free-list allocator** that carves
//! variable-sized blocks out of one growable arena and takes them back again,
//! merging neighbours as they are freed.
//!
//! ## Overview
//!
//! ```text
//!   Arena:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                            ARENA                                     │
//!   │                                                                      │
//!   │   ┌──────────────┬─────┬──────────┬─────┬─────────────┬──────────┐   │
//!   │   │     Free     │ A1  │   Free   │ A2  │     A3      │   Free   │   │
//!   │   └──────────────┴─────┴──────────┴─────┴─────────────┴──────────┘   │
//!   │          │                 ▲  │                            ▲         │
//!   │          └─────────────────┘  └────────────────────────────┘         │
//!   │               free list: address ordered, circular                   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation resumes where the last one stopped (next-fit).
//!   Freeing merges with free neighbours on both sides.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   kralloc
//!   ├── align      - units! macro (bytes to header units)
//!   ├── block      - Block header layout and tags
//!   ├── host       - Where arena memory comes from (Vec or mmap)
//!   ├── arena      - Arena growth
//!   ├── freelist   - Next-fit search, split, insert and coalesce
//!   ├── heap       - Heap: allocate / free
//!   ├── report     - Reporter collaborator for failed calls
//!   ├── config     - Tunables and their environment variables
//!   └── error      - Error types
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use kralloc::{ErrorKind, Heap};
//!
//! let mut heap = Heap::new();
//!
//! let ptr = heap.allocate(8).unwrap();
//! heap.payload_mut(ptr).unwrap()[..8].copy_from_slice(&42u64.to_ne_bytes());
//!
//! heap.free(ptr).unwrap();
//!
//! // A second free is caught and leaves the heap alone.
//! let err = heap.free(ptr).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::DoubleFree);
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a one-unit header. Sizes are counted in units, the
//! header included, so a request for `n` bytes takes `ceil(n / UNIT) + 1`
//! units:
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: link      │  │  ┌──────────────────────────┐  │
//!   │  │ size: N units   │  │  │                          │  │
//!   │  │ tag: Allocated  │  │  │  (N - 1) * UNIT bytes    │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │      24 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Ptr returned to the caller
//! ```
//!
//! When no free block is big enough the arena asks its [`Host`] for at least
//! [`MIN_GROWTH`] more units, the way `sbrk(2)` moves the program break, and
//! the new memory joins the free list like any freed block would.
//!
//! `free` looks at the tag in front of the pointer: `Allocated` blocks go back
//! on the list, `Freed` ones are a double free and anything else is a pointer
//! this heap never handed out. Failed calls are passed to a [`Reporter`] with
//! the caller's file and line.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No shrinking**: Memory is never given back to the host
//! - **Best-effort checks**: A clobbered header can fool `free`
//! - **Offsets, not addresses**: A [`Ptr`] is only meaningful to its heap

pub mod align;
mod arena;
mod block;
pub mod config;
pub mod error;
mod freelist;
mod heap;
pub mod host;
pub mod report;

pub use arena::MIN_GROWTH;
pub use block::UNIT;
pub use config::Config;
pub use error::{ErrorKind, HeapError, HostError};
pub use heap::{FreeBlock, Heap, Ptr, Stats};
#[cfg(unix)]
pub use host::MmapHost;
pub use host::{BufferHost, Host};
pub use report::{LogReporter, Recorder, Report, Reporter};
