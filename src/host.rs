//! Host environment the arena grows into.
//!
//! The allocator only needs one thing from its environment: a contiguous
//! region it can extend at the end, the way `sbrk(2)` moves the program break.
//!
//! ```text
//!   0                          break                      limit
//!   ┌───────────────────────────┬──────────────────────────┐
//!   │   arena (committed)       │  not yet handed out      │
//!   └───────────────────────────┴──────────────────────────┘
//!                               ▲
//!                               └── sbrk(n) returns this, then moves it n bytes
//! ```
//!
//! Two hosts are provided: [`BufferHost`] keeps the arena in a `Vec<u8>` and
//! [`MmapHost`] (unix only) reserves virtual memory up front and commits pages
//! as the break advances.

use crate::error::HostError;

/// Source of arena memory.
pub trait Host {
  /// Extends the region by `increment` bytes and returns the previous break.
  /// The new bytes start exactly at the returned offset.
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<usize, HostError>;

  /// Everything below the current break.
  fn memory(&self) -> &[u8];

  /// Everything below the current break.
  fn memory_mut(&mut self) -> &mut [u8];

  /// Current break in bytes.
  fn program_break(&self) -> usize {
    self.memory().len()
  }
}

/// Arena memory kept in a growable byte buffer with a fixed ceiling.
#[derive(Debug)]
pub struct BufferHost {
  buffer: Vec<u8>,
  limit: usize,
}

impl BufferHost {
  pub fn new(limit: usize) -> Self {
    Self {
      buffer: Vec::new(),
      limit,
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

impl Host for BufferHost {
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<usize, HostError> {
    let old_break = self.buffer.len();
    let available = self.limit.saturating_sub(old_break);

    if increment > available {
      return Err(HostError::LimitReached {
        requested: increment,
        available,
      });
    }

    self
      .buffer
      .try_reserve_exact(increment)
      .map_err(|err| HostError::Os(std::io::Error::new(std::io::ErrorKind::OutOfMemory, err)))?;
    self.buffer.resize(old_break + increment, 0);

    Ok(old_break)
  }

  fn memory(&self) -> &[u8] {
    &self.buffer
  }

  fn memory_mut(&mut self) -> &mut [u8] {
    &mut self.buffer
  }
}

#[cfg(unix)]
pub use self::unix::MmapHost;

#[cfg(unix)]
mod unix {
  use std::{io, ptr::NonNull, slice};

  use super::Host;
  use crate::error::HostError;

  /// Arena memory backed by one private anonymous mapping.
  ///
  /// The whole `limit` is reserved with no access rights when the host is
  /// created; [`Host::sbrk`] then makes pages readable and writable as the
  /// break moves past them. The mapping is released when the host is dropped,
  /// never before.
  #[derive(Debug)]
  pub struct MmapHost {
    base: NonNull<u8>,
    limit: usize,
    committed: usize,
    brk: usize,
    page_size: usize,
  }

  impl MmapHost {
    /// Reserves `limit` bytes of address space, rounded up to whole pages.
    pub fn new(limit: usize) -> Result<Self, HostError> {
      let page_size = page_size();
      let limit = limit
        .checked_next_multiple_of(page_size)
        .ok_or_else(|| HostError::Os(io::Error::other("reservation size overflows")))?
        .max(page_size);

      // Reserved only: no permissions until pages are committed.
      let address = unsafe {
        libc::mmap(
          std::ptr::null_mut(),
          limit,
          libc::PROT_NONE,
          libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
          -1,
          0,
        )
      };

      if address == libc::MAP_FAILED {
        return Err(HostError::Os(io::Error::last_os_error()));
      }

      let base = NonNull::new(address.cast::<u8>()).ok_or_else(|| HostError::Os(io::Error::other("mmap returned null")))?;

      log::debug!("reserved {limit} bytes of address space at {base:p}");

      Ok(Self {
        base,
        limit,
        committed: 0,
        brk: 0,
        page_size,
      })
    }

    pub fn limit(&self) -> usize {
      self.limit
    }
  }

  impl Host for MmapHost {
    fn sbrk(
      &mut self,
      increment: usize,
    ) -> Result<usize, HostError> {
      let old_break = self.brk;
      let available = self.limit - old_break;

      if increment > available {
        return Err(HostError::LimitReached {
          requested: increment,
          available,
        });
      }

      let new_break = old_break + increment;

      if new_break > self.committed {
        // `limit` is page aligned, so rounding up stays inside the mapping.
        let target = new_break.next_multiple_of(self.page_size);
        let status = unsafe {
          libc::mprotect(
            self.base.as_ptr().add(self.committed).cast::<libc::c_void>(),
            target - self.committed,
            libc::PROT_READ | libc::PROT_WRITE,
          )
        };

        if status != 0 {
          return Err(HostError::Os(io::Error::last_os_error()));
        }

        self.committed = target;
      }

      self.brk = new_break;

      Ok(old_break)
    }

    fn memory(&self) -> &[u8] {
      // Everything below `brk` is committed read-write and owned by `self`.
      unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
    }

    fn memory_mut(&mut self) -> &mut [u8] {
      unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
    }
  }

  impl Drop for MmapHost {
    fn drop(&mut self) {
      let status = unsafe { libc::munmap(self.base.as_ptr().cast::<libc::c_void>(), self.limit) };
      if status != 0 {
        log::warn!(
          "munmap of {} bytes at {:p} failed: {}",
          self.limit,
          self.base,
          io::Error::last_os_error()
        );
      }
    }
  }

  fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      size if size > 0 => size as usize,
      _ => 4096,
    }
  }

}
