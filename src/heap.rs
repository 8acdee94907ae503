use std::{fmt, panic::Location};

use crate::{
  arena::Arena,
  block::{Tag, UNIT},
  config::Config,
  error::{HeapError, HostError},
  freelist::FreeList,
  host::{BufferHost, Host},
  report::{LogReporter, Reporter},
  units,
};

/// Location of a payload, as a byte offset from the start of the arena.
///
/// A `Ptr` handed out by [`Heap::allocate`] always sits exactly one unit after
/// its block header. Any other value can be built with [`Ptr::from_offset`];
/// the heap treats those as foreign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(usize);

impl Ptr {
  pub const fn from_offset(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }

  fn from_header(at: usize) -> Self {
    Self((at + 1) * UNIT)
  }

  /// Unit index of the header right before this payload.
  fn header(self) -> Option<usize> {
    if self.0 % UNIT != 0 {
      return None;
    }
    (self.0 / UNIT).checked_sub(1)
  }
}

impl fmt::Display for Ptr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}

/// One entry of [`Heap::free_blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
  /// Byte offset of the block header.
  pub offset: usize,
  /// Size in units, header included.
  pub units: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
  /// Sum of all block sizes, free and allocated.
  pub arena_units: usize,
  pub free_units: usize,
  pub free_blocks: usize,
  pub growths: usize,
}

/// A heap: one arena, one free list, one reporter.
///
/// Nothing is requested from the host until the first [`Heap::allocate`].
/// The heap is meant for one caller at a time; share it behind a lock if it
/// has to cross threads.
pub struct Heap<H = BufferHost, R = LogReporter> {
  arena: Arena<H>,
  free: Option<FreeList>,
  reporter: R,
}

impl Heap {
  pub fn new() -> Self {
    Self::with_config(Config::default())
  }

  pub fn with_config(config: Config) -> Self {
    Self::with_parts(BufferHost::new(config.arena_limit), config, LogReporter)
  }
}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(unix)]
impl Heap<crate::host::MmapHost> {
  /// A heap whose arena lives in its own anonymous mapping of
  /// `config.arena_limit` bytes.
  pub fn with_mmap(config: Config) -> Result<Self, HostError> {
    let host = crate::host::MmapHost::new(config.arena_limit)?;
    Ok(Self::with_parts(host, config, LogReporter))
  }
}

impl<H: Host, R: Reporter> Heap<H, R> {
  pub fn with_parts(
    host: H,
    config: Config,
    reporter: R,
  ) -> Self {
    Self {
      arena: Arena::new(host, config.min_growth),
      free: None,
      reporter,
    }
  }

  /// Allocates room for `nbytes` bytes. Failures are also handed to the
  /// reporter together with the caller's location.
  #[track_caller]
  pub fn allocate(
    &mut self,
    nbytes: usize,
  ) -> Result<Ptr, HeapError> {
    let location = Location::caller();
    let result = self.try_allocate(nbytes);

    if let Err(err) = &result {
      self.reporter.report(err.kind(), location);
    }

    result
  }

  /// Releases a pointer returned by [`Heap::allocate`].
  ///
  /// The check is only as good as the header in front of `ptr`: a pointer
  /// whose header was overwritten can still be accepted. Rejected pointers
  /// leave the heap untouched.
  #[track_caller]
  pub fn free(
    &mut self,
    ptr: Ptr,
  ) -> Result<(), HeapError> {
    let location = Location::caller();
    let result = self.try_free(ptr);

    if let Err(err) = &result {
      self.reporter.report(err.kind(), location);
    }

    result
  }

  fn try_allocate(
    &mut self,
    nbytes: usize,
  ) -> Result<Ptr, HeapError> {
    let nunits = units!(nbytes).ok_or(HeapError::AllocationFailed {
      nbytes,
      source: HostError::TooLarge { units: usize::MAX },
    })?;

    let free = self.free.get_or_insert_with(|| {
      log::debug!("free list created, unit size {UNIT} bytes");
      FreeList::new()
    });

    let at = match free.find_fit(&mut self.arena, nunits) {
      Some(at) => at,
      None => {
        self
          .arena
          .grow(free, nunits)
          .map_err(|source| HeapError::AllocationFailed { nbytes, source })?;

        free
          .find_fit(&mut self.arena, nunits)
          .ok_or(HeapError::AllocationFailed {
            nbytes,
            source: HostError::LimitReached {
              requested: nunits.saturating_mul(UNIT),
              available: 0,
            },
          })?
      }
    };

    self.arena.set_tag(at, Tag::Allocated);

    Ok(Ptr::from_header(at))
  }

  fn try_free(
    &mut self,
    ptr: Ptr,
  ) -> Result<(), HeapError> {
    let Some(free) = self.free.as_mut() else {
      return Err(HeapError::ForeignPointer(ptr));
    };

    let at = ptr
      .header()
      .filter(|at| self.arena.contains(*at))
      .ok_or(HeapError::ForeignPointer(ptr))?;

    match self.arena.tag(at) {
      Some(Tag::Allocated) => {
        self.arena.set_tag(at, Tag::Freed);
        free.insert(&mut self.arena, at);
        Ok(())
      }
      Some(Tag::Freed) => Err(HeapError::DoubleFree(ptr)),
      Some(Tag::Free) | None => Err(HeapError::ForeignPointer(ptr)),
    }
  }

  /// Header unit of a live allocation.
  fn live(
    &self,
    ptr: Ptr,
  ) -> Option<usize> {
    self.free.as_ref()?;
    ptr
      .header()
      .filter(|at| self.arena.contains(*at))
      .filter(|at| self.arena.tag(*at) == Some(Tag::Allocated))
  }

  /// Payload bytes of a live allocation.
  pub fn payload(
    &self,
    ptr: Ptr,
  ) -> Option<&[u8]> {
    let at = self.live(ptr)?;
    Some(self.arena.payload(at, self.arena.header(at).size))
  }

  pub fn payload_mut(
    &mut self,
    ptr: Ptr,
  ) -> Option<&mut [u8]> {
    let at = self.live(ptr)?;
    let size = self.arena.header(at).size;
    Some(self.arena.payload_mut(at, size))
  }

  /// Bytes the caller may use behind `ptr`, which can exceed the amount
  /// asked for by up to one unit minus one byte.
  pub fn usable_size(
    &self,
    ptr: Ptr,
  ) -> Option<usize> {
    self.payload(ptr).map(<[u8]>::len)
  }

  /// Free blocks in address order.
  pub fn free_blocks(&self) -> Vec<FreeBlock> {
    match &self.free {
      Some(free) => free
        .blocks(&self.arena)
        .into_iter()
        .map(|(at, units)| FreeBlock {
          offset: at * UNIT,
          units,
        })
        .collect(),
      None => Vec::new(),
    }
  }

  pub fn stats(&self) -> Stats {
    let blocks = self.free_blocks();

    Stats {
      arena_units: self.arena.units(),
      free_units: blocks.iter().map(|block| block.units).sum(),
      free_blocks: blocks.len(),
      growths: self.arena.growths(),
    }
  }

  /// End of the arena in bytes.
  pub fn program_break(&self) -> usize {
    self.arena.host().program_break()
  }

  /// Whether the first allocation has happened.
  pub fn is_initialized(&self) -> bool {
    self.free.is_some()
  }

  pub fn reporter(&self) -> &R {
    &self.reporter
  }

  pub fn reporter_mut(&mut self) -> &mut R {
    &mut self.reporter
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{error::ErrorKind, report::Recorder};

  fn recording(min_growth: usize) -> Heap<BufferHost, Recorder> {
    let config = Config {
      min_growth,
      ..Config::default()
    };
    Heap::with_parts(BufferHost::new(config.arena_limit), config, Recorder::new())
  }

  #[test]
  fn test_alloc() {
    let mut heap = Heap::new();
    assert!(!heap.is_initialized());

    let first = heap.allocate(8).unwrap();
    heap.payload_mut(first).unwrap()[..8].copy_from_slice(&3u64.to_ne_bytes());

    let second = heap.allocate(12).unwrap();
    for (i, byte) in heap.payload_mut(second).unwrap().iter_mut().enumerate() {
      *byte = i as u8 + 1;
    }

    assert_ne!(first, second);
    assert_eq!(&heap.payload(first).unwrap()[..8], &3u64.to_ne_bytes());
    for (i, byte) in heap.payload(second).unwrap()[..12].iter().enumerate() {
      assert_eq!(*byte, i as u8 + 1);
    }

    heap.free(first).unwrap();
    let third = heap.allocate(4).unwrap();
    assert_eq!(first, third);
  }

  #[test]
  fn test_pointer_sits_one_unit_after_header() {
    let mut heap = recording(4);

    let ptr = heap.allocate(UNIT).unwrap();

    assert_eq!(ptr.offset() % UNIT, 0);
    assert_eq!(heap.usable_size(ptr), Some(UNIT));
    // Tail split of a fresh 4-unit block.
    assert_eq!(ptr.offset(), 3 * UNIT);
  }

  #[test]
  fn test_zero_byte_request_gets_a_header_only_block() {
    let mut heap = recording(8);

    let ptr = heap.allocate(0).unwrap();

    assert_eq!(heap.usable_size(ptr), Some(0));
    assert_eq!(heap.stats().free_units, 7);
    heap.free(ptr).unwrap();
    assert_eq!(heap.stats().free_units, 8);
  }

  #[test]
  fn test_reused_pointer_frees_then_double_frees() {
    let mut heap = recording(1024);

    let p1 = heap.allocate(8).unwrap();
    let p2 = heap.allocate(8).unwrap();
    assert_ne!(p1, p2);

    heap.free(p1).unwrap();
    let p3 = heap.allocate(8).unwrap();
    assert_eq!(p3, p1);

    heap.free(p2).unwrap();
    // p1 names the live block handed out again as p3.
    heap.free(p1).unwrap();
    assert!(matches!(heap.free(p1), Err(HeapError::DoubleFree(ptr)) if ptr == p1));
    assert_eq!(heap.reporter().kinds(), vec![ErrorKind::DoubleFree]);
    assert_eq!(heap.stats().free_blocks, 1);
  }

  #[test]
  fn test_free_before_first_allocation_is_foreign() {
    let mut heap = recording(8);

    let err = heap.free(Ptr::from_offset(UNIT)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ForeignPointer);
    assert!(!heap.is_initialized());
    assert_eq!(heap.stats(), Stats::default());
  }

  #[test]
  fn test_reports_carry_the_call_site() {
    let mut heap = recording(8);
    let ptr = heap.allocate(1).unwrap();
    heap.free(ptr).unwrap();

    let line = line!() + 1;
    let _ = heap.free(ptr);

    let report = heap.reporter().reports()[0];
    assert_eq!(report.kind, ErrorKind::DoubleFree);
    assert_eq!(report.line, line);
    assert!(report.file.ends_with("heap.rs"));
  }

  #[test]
  fn test_allocation_failure_is_reported() {
    let config = Config {
      min_growth: 4,
      arena_limit: 8 * UNIT,
    };
    let mut heap = Heap::with_parts(BufferHost::new(config.arena_limit), config, Recorder::new());

    heap.allocate(3 * UNIT).unwrap();
    let err = heap.allocate(4 * UNIT).unwrap_err();

    assert!(matches!(
      err,
      HeapError::AllocationFailed {
        source: HostError::LimitReached { .. },
        ..
      }
    ));
    assert_eq!(heap.reporter().kinds(), vec![ErrorKind::AllocationFailed]);
    assert_eq!(heap.stats().growths, 1);
  }

  #[test]
  fn test_oversized_request_fails_without_growth() {
    let mut heap = recording(8);

    let err = heap.allocate(usize::MAX).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AllocationFailed);
    assert_eq!(heap.stats().growths, 0);
  }

  #[test]
  fn test_payload_is_only_for_live_blocks() {
    let mut heap = recording(8);
    let ptr = heap.allocate(UNIT).unwrap();

    assert!(heap.payload(ptr).is_some());
    assert!(heap.payload(Ptr::from_offset(ptr.offset() + 1)).is_none());

    heap.free(ptr).unwrap();
    assert!(heap.payload(ptr).is_none());
    assert!(heap.payload_mut(ptr).is_none());
    assert_eq!(heap.usable_size(ptr), None);
  }

  #[cfg(unix)]
  #[test]
  fn test_mmap_backed_heap() {
    let mut heap = Heap::with_mmap(Config {
      min_growth: 64,
      arena_limit: 1 << 20,
    })
    .unwrap();

    let a = heap.allocate(100).unwrap();
    heap.payload_mut(a).unwrap().fill(0x5A);
    let b = heap.allocate(100).unwrap();

    assert!(heap.payload(a).unwrap().iter().all(|byte| *byte == 0x5A));
    heap.free(a).unwrap();
    heap.free(b).unwrap();

    assert_eq!(heap.stats().free_blocks, 1);
    assert_eq!(heap.program_break(), 64 * UNIT);
  }
}
