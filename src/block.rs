use std::mem;

/// Size in bytes of one header unit. Block sizes are counted in these.
pub const UNIT: usize = mem::size_of::<[u64; 3]>();

const NEXT: usize = 0;
const SIZE: usize = 8;
const TAG: usize = 16;

/// Stored `next` word meaning "the sentinel".
const SENTINEL_WORD: u64 = u64::MAX;

const ALLOCATED_WORD: u64 = 0xAAAA_AAAA;
const FREE_WORD: u64 = 0x5555_5555;
const FREED_WORD: u64 = 0xDDDD_DDDD;

/// Allocation state stored in every block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
  /// Handed out to a caller.
  Allocated,
  /// Fresh memory from a growth event, never handed out.
  Free,
  /// Released by a caller and back on the free list.
  Freed,
}

impl Tag {
  fn to_word(self) -> u64 {
    match self {
      Tag::Allocated => ALLOCATED_WORD,
      Tag::Free => FREE_WORD,
      Tag::Freed => FREED_WORD,
    }
  }

  /// `None` means the word was not written by this allocator.
  fn from_word(word: u64) -> Option<Self> {
    match word {
      ALLOCATED_WORD => Some(Tag::Allocated),
      FREE_WORD => Some(Tag::Free),
      FREED_WORD => Some(Tag::Freed),
      _ => None,
    }
  }
}

/// A free-list link. The sentinel has no storage in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
  Sentinel,
  /// Unit index of a block header.
  Block(usize),
}

impl Link {
  fn to_word(self) -> u64 {
    match self {
      Link::Sentinel => SENTINEL_WORD,
      Link::Block(at) => at as u64,
    }
  }

  fn from_word(word: u64) -> Self {
    match word {
      SENTINEL_WORD => Link::Sentinel,
      at => Link::Block(at as usize),
    }
  }
}

/// Decoded block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
  pub next: Link,
  pub size: usize,
  pub tag: Option<Tag>,
}

impl Header {
  pub fn new(
    size: usize,
    tag: Tag,
  ) -> Self {
    Self {
      next: Link::Sentinel,
      size,
      tag: Some(tag),
    }
  }

  /// Decodes the header stored in `unit`, which must be exactly [`UNIT`]
  /// bytes long.
  pub fn read(unit: &[u8]) -> Self {
    Self {
      next: Link::from_word(read_word(unit, NEXT)),
      size: read_word(unit, SIZE) as usize,
      tag: Tag::from_word(read_word(unit, TAG)),
    }
  }

  /// Encodes this header into `unit`. A header without a tag keeps whatever
  /// tag word is already stored there.
  pub fn write(
    &self,
    unit: &mut [u8],
  ) {
    write_word(unit, NEXT, self.next.to_word());
    write_word(unit, SIZE, self.size as u64);
    if let Some(tag) = self.tag {
      write_word(unit, TAG, tag.to_word());
    }
  }

  /// Reads only the tag word of the header stored in `unit`.
  pub fn read_tag(unit: &[u8]) -> Option<Tag> {
    Tag::from_word(read_word(unit, TAG))
  }

  /// Overwrites only the tag word of the header stored in `unit`.
  pub fn write_tag(
    unit: &mut [u8],
    tag: Tag,
  ) {
    write_word(unit, TAG, tag.to_word());
  }
}

fn read_word(
  unit: &[u8],
  at: usize,
) -> u64 {
  let mut word = [0u8; 8];
  word.copy_from_slice(&unit[at..at + 8]);
  u64::from_ne_bytes(word)
}

fn write_word(
  unit: &mut [u8],
  at: usize,
  value: u64,
) {
  unit[at..at + 8].copy_from_slice(&value.to_ne_bytes());
}
