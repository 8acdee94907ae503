use crate::{
  block::{Header, Tag, UNIT},
  error::HostError,
  freelist::FreeList,
  host::Host,
};

/// Minimum number of units requested from the host per growth event.
pub const MIN_GROWTH: usize = 1024;

/// The contiguous region every block lives in, addressed by unit index.
///
/// ```text
///   unit:   0          k                        n
///           ┌──────────┬────────────────────────┐
///           │ hdr │ .. │ hdr │ payload ...      │
///           └──────────┴────────────────────────┘
///            block @0   block @k (size n - k)
/// ```
///
/// The arena only ever grows. Blocks tile it without gaps, so the sum of all
/// block sizes always equals [`Arena::units`].
pub struct Arena<H> {
  host: H,
  min_growth: usize,
  growths: usize,
}

impl<H: Host> Arena<H> {
  pub fn new(
    host: H,
    min_growth: usize,
  ) -> Self {
    Self {
      host,
      min_growth: min_growth.max(1),
      growths: 0,
    }
  }

  /// Units handed out by the host so far.
  pub fn units(&self) -> usize {
    self.host.program_break() / UNIT
  }

  /// Number of successful growth events.
  pub fn growths(&self) -> usize {
    self.growths
  }

  pub fn host(&self) -> &H {
    &self.host
  }

  pub fn contains(
    &self,
    at: usize,
  ) -> bool {
    at < self.units()
  }

  pub fn header(
    &self,
    at: usize,
  ) -> Header {
    Header::read(self.unit(at))
  }

  pub fn set_header(
    &mut self,
    at: usize,
    header: Header,
  ) {
    header.write(self.unit_mut(at));
  }

  pub fn tag(
    &self,
    at: usize,
  ) -> Option<Tag> {
    Header::read_tag(self.unit(at))
  }

  pub fn set_tag(
    &mut self,
    at: usize,
    tag: Tag,
  ) {
    Header::write_tag(self.unit_mut(at), tag);
  }

  /// Payload bytes of the `size`-unit block whose header is at `at`, clamped
  /// to the end of the arena.
  pub fn payload(
    &self,
    at: usize,
    size: usize,
  ) -> &[u8] {
    let memory = self.host.memory();
    let (start, end) = payload_bounds(at, size, memory.len());
    &memory[start..end]
  }

  pub fn payload_mut(
    &mut self,
    at: usize,
    size: usize,
  ) -> &mut [u8] {
    let memory = self.host.memory_mut();
    let (start, end) = payload_bounds(at, size, memory.len());
    &mut memory[start..end]
  }

  /// Asks the host for at least `min_units` more units and hands them to
  /// `free` as one block, which merges with a free block ending right where
  /// the new memory starts.
  pub fn grow(
    &mut self,
    free: &mut FreeList,
    min_units: usize,
  ) -> Result<(), HostError> {
    let units = min_units.max(self.min_growth);
    let bytes = units
      .checked_mul(UNIT)
      .ok_or(HostError::TooLarge { units })?;

    // Keep blocks on unit boundaries even if the host came with a ragged break.
    let pad = (UNIT - self.host.program_break() % UNIT) % UNIT;
    let increment = bytes
      .checked_add(pad)
      .ok_or(HostError::TooLarge { units })?;

    let old_break = self.host.sbrk(increment)?;
    let at = (old_break + pad) / UNIT;

    self.set_header(at, Header::new(units, Tag::Free));
    self.growths += 1;

    log::debug!(
      "arena grew by {units} units at unit {at}, now {} units",
      self.units()
    );

    free.insert(self, at);

    Ok(())
  }

  fn unit(
    &self,
    at: usize,
  ) -> &[u8] {
    &self.host.memory()[at * UNIT..(at + 1) * UNIT]
  }

  fn unit_mut(
    &mut self,
    at: usize,
  ) -> &mut [u8] {
    &mut self.host.memory_mut()[at * UNIT..(at + 1) * UNIT]
  }
}

fn payload_bounds(
  at: usize,
  size: usize,
  len: usize,
) -> (usize, usize) {
  let start = (at + 1).saturating_mul(UNIT).min(len);
  let end = at.saturating_add(size).saturating_mul(UNIT).min(len);
  (start, end.max(start))
}
