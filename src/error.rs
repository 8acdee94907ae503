use std::fmt;

use thiserror::Error;

use crate::heap::Ptr;

/// Why the host environment refused to extend the arena.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("arena limit reached: requested {requested} bytes, {available} available")]
  LimitReached { requested: usize, available: usize },

  #[error("request of {units} units does not fit in the address space")]
  TooLarge { units: usize },

  #[error("host refused to extend the arena: {0}")]
  Os(#[from] std::io::Error),
}

/// Every non-success outcome of [`crate::Heap::allocate`] and
/// [`crate::Heap::free`].
#[derive(Debug, Error)]
pub enum HeapError {
  #[error("allocation of {nbytes} bytes failed")]
  AllocationFailed {
    nbytes: usize,
    #[source]
    source: HostError,
  },

  #[error("double free of {0}")]
  DoubleFree(Ptr),

  #[error("free of foreign pointer {0}")]
  ForeignPointer(Ptr),
}

impl HeapError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      HeapError::AllocationFailed { .. } => ErrorKind::AllocationFailed,
      HeapError::DoubleFree(_) => ErrorKind::DoubleFree,
      HeapError::ForeignPointer(_) => ErrorKind::ForeignPointer,
    }
  }
}

/// The plain signal handed to a [`crate::Reporter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  AllocationFailed,
  DoubleFree,
  ForeignPointer,
}

impl fmt::Display for ErrorKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ErrorKind::AllocationFailed => write!(f, "allocation failed"),
      ErrorKind::DoubleFree => write!(f, "double free"),
      ErrorKind::ForeignPointer => write!(f, "foreign pointer"),
    }
  }
}
