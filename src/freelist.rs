//! Circular, address-ordered free list with a next-fit cursor.
//!
//! Every free block stores the unit index of the next free block in its
//! header. The list is closed by a sentinel that owns no arena memory; its
//! link lives in [`FreeList`] itself:
//!
//! ```text
//!          ┌──────────────────────────────────────────────────┐
//!          ▼                                                  │
//!   ┌────────────┐     ┌─────────┐     ┌─────────┐     ┌──────┴──┐
//!   │  Sentinel  │ ──▶ │ free @3 │ ──▶ │ free @9 │ ──▶ │ free @40│
//!   └────────────┘     └─────────┘     └─────────┘     └─────────┘
//!                           ▲
//!                           └── cursor: the next search starts after it
//! ```
//!
//! Blocks are kept in ascending address order. The sentinel is the only place
//! where the order wraps around: as a predecessor it sits below every block,
//! as a successor it sits above every block. That makes "where does block `b`
//! go" a single total comparison instead of a special case per end of the
//! arena.
//!
//! Searching is next-fit: [`FreeList::find_fit`] starts at the node after the
//! cursor and walks at most one revolution. Big blocks are split from their
//! tail so the remaining part keeps its header and its place in the list.
//!
//! ```text
//!   before:  │ hdr │ free .............................. │
//!   after:   │ hdr │ free ............ │ hdr │ returned  │
//!                                      ▲
//!                                      └── at + (size - nunits)
//! ```
//!
//! [`FreeList::insert`] merges a block with the free block right after it and
//! then with the free block right before it, whenever their addresses touch.

use crate::{
  arena::Arena,
  block::{Header, Link, Tag},
  host::Host,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeList {
  /// The sentinel's `next` link.
  head: Link,
  cursor: Link,
  len: usize,
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}

impl FreeList {
  /// A list holding only the sentinel, which points at itself.
  pub const fn new() -> Self {
    Self {
      head: Link::Sentinel,
      cursor: Link::Sentinel,
      len: 0,
    }
  }

  /// Number of free blocks, not counting the sentinel.
  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.len
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[cfg(test)]
  pub fn cursor(&self) -> Link {
    self.cursor
  }

  /// Finds a block of at least `nunits` units and takes `nunits` of it off
  /// the list, tagged [`Tag::Allocated`]. Returns the unit index of the taken
  /// block, or `None` after a full revolution without a fit.
  pub fn find_fit<H: Host>(
    &mut self,
    arena: &mut Arena<H>,
    nunits: usize,
  ) -> Option<usize> {
    let mut prev = self.cursor;
    let mut node = self.next(arena, prev);

    loop {
      if let Link::Block(at) = node {
        let mut header = arena.header(at);

        if header.size >= nunits {
          let block = if header.size == nunits {
            self.set_next(arena, prev, header.next);
            self.len -= 1;
            arena.set_tag(at, Tag::Allocated);
            log::trace!("exact fit of {nunits} units at unit {at}");
            at
          } else {
            header.size -= nunits;
            header.tag = None;
            arena.set_header(at, header);

            let tail = at + header.size;
            arena.set_header(tail, Header::new(nunits, Tag::Allocated));
            log::trace!("split {nunits} units off the tail of unit {at}");
            tail
          };

          self.cursor = prev;
          return Some(block);
        }
      }

      if node == self.cursor {
        return None;
      }

      prev = node;
      node = self.next(arena, node);
    }
  }

  /// Links the block at unit `at` into the list, merging it with free
  /// neighbours that touch it. The block's own header must already carry its
  /// size; its tag is left as it is.
  pub fn insert<H: Host>(
    &mut self,
    arena: &mut Arena<H>,
    at: usize,
  ) {
    let this = Link::Block(at);
    let mut prev = self.cursor;
    let mut next = self.next(arena, prev);

    while !(precedes(prev, at) && follows(next, at)) {
      if prev == this || next == this {
        log::warn!("block at unit {at} is already on the free list");
        return;
      }

      prev = next;
      next = self.next(arena, prev);
    }

    let mut block = arena.header(at);
    block.tag = None;
    self.len += 1;

    match next {
      Link::Block(after) if at.checked_add(block.size) == Some(after) => {
        let absorbed = arena.header(after);
        block.size += absorbed.size;
        block.next = absorbed.next;
        self.len -= 1;
        log::trace!("merged unit {after} into unit {at}");
      }
      _ => block.next = next,
    }

    arena.set_header(at, block);

    match prev {
      Link::Block(before) => {
        let mut header = arena.header(before);

        if before.checked_add(header.size) == Some(at) {
          header.size += block.size;
          header.next = block.next;
          header.tag = None;
          arena.set_header(before, header);
          self.len -= 1;
          log::trace!("merged unit {at} into unit {before}");
        } else {
          self.set_next(arena, prev, this);
        }
      }
      Link::Sentinel => self.set_next(arena, prev, this),
    }

    self.cursor = prev;
  }

  /// `(unit index, size)` of every free block in address order.
  pub fn blocks<H: Host>(
    &self,
    arena: &Arena<H>,
  ) -> Vec<(usize, usize)> {
    let mut blocks = Vec::with_capacity(self.len);
    let mut node = self.head;

    while let Link::Block(at) = node {
      if blocks.len() > self.len {
        log::error!("free list does not close after {} nodes", self.len);
        break;
      }

      let header = arena.header(at);
      blocks.push((at, header.size));
      node = header.next;
    }

    blocks
  }

  fn next<H: Host>(
    &self,
    arena: &Arena<H>,
    node: Link,
  ) -> Link {
    match node {
      Link::Sentinel => self.head,
      Link::Block(at) => arena.header(at).next,
    }
  }

  fn set_next<H: Host>(
    &mut self,
    arena: &mut Arena<H>,
    node: Link,
    next: Link,
  ) {
    match node {
      Link::Sentinel => self.head = next,
      Link::Block(at) => {
        let mut header = arena.header(at);
        header.next = next;
        header.tag = None;
        arena.set_header(at, header);
      }
    }
  }
}

/// `node` comes before unit `at` when it is the predecessor.
fn precedes(
  node: Link,
  at: usize,
) -> bool {
  match node {
    Link::Sentinel => true,
    Link::Block(other) => other < at,
  }
}

/// `node` comes after unit `at` when it is the successor.
fn follows(
  node: Link,
  at: usize,
) -> bool {
  match node {
    Link::Sentinel => true,
    Link::Block(other) => other > at,
  }
}
