use std::panic::Location;

use crate::error::ErrorKind;

/// Receives every non-success outcome of the heap together with the call
/// site that caused it. What happens next is up to the implementation; the
/// heap never looks back at it.
pub trait Reporter {
  fn report(
    &mut self,
    kind: ErrorKind,
    location: &'static Location<'static>,
  );
}

impl<F> Reporter for F
where
  F: FnMut(ErrorKind, &'static Location<'static>),
{
  fn report(
    &mut self,
    kind: ErrorKind,
    location: &'static Location<'static>,
  ) {
    self(kind, location)
  }
}

/// Default reporter: one log line per outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
  fn report(
    &mut self,
    kind: ErrorKind,
    location: &'static Location<'static>,
  ) {
    match kind {
      ErrorKind::AllocationFailed => {
        log::error!("{kind} at {}:{}", location.file(), location.line())
      }
      ErrorKind::DoubleFree | ErrorKind::ForeignPointer => {
        log::warn!("{kind} at {}:{}", location.file(), location.line())
      }
    }
  }
}

/// One captured report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Report {
  pub kind: ErrorKind,
  pub file: &'static str,
  pub line: u32,
}

/// Keeps every report it receives, oldest first.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
  reports: Vec<Report>,
}

impl Recorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reports(&self) -> &[Report] {
    &self.reports
  }

  pub fn kinds(&self) -> Vec<ErrorKind> {
    self.reports.iter().map(|report| report.kind).collect()
  }

  pub fn clear(&mut self) {
    self.reports.clear();
  }
}

impl Reporter for Recorder {
  fn report(
    &mut self,
    kind: ErrorKind,
    location: &'static Location<'static>,
  ) {
    self.reports.push(Report {
      kind,
      file: location.file(),
      line: location.line(),
    });
  }
}
