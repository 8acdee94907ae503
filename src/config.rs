use crate::arena::MIN_GROWTH;

/// Default ceiling on arena size: 64 MiB.
pub const DEFAULT_ARENA_LIMIT: usize = 64 << 20;

const MIN_GROWTH_VAR: &str = "KRALLOC_MIN_GROWTH";
const ARENA_LIMIT_VAR: &str = "KRALLOC_ARENA_LIMIT";

/// Heap tunables, fixed once the heap is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
  /// Minimum units requested from the host per growth event.
  pub min_growth: usize,
  /// Bytes the arena may grow to before growth is refused.
  pub arena_limit: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      min_growth: MIN_GROWTH,
      arena_limit: DEFAULT_ARENA_LIMIT,
    }
  }
}

impl Config {
  /// Defaults overridden by `KRALLOC_MIN_GROWTH` and `KRALLOC_ARENA_LIMIT`.
  /// Values that are not plain decimal numbers are ignored.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();

    if let Some(units) = parse_var(&lookup, MIN_GROWTH_VAR) {
      config.min_growth = units.max(1);
    }
    if let Some(bytes) = parse_var(&lookup, ARENA_LIMIT_VAR) {
      config.arena_limit = bytes;
    }

    config
  }
}

fn parse_var<F>(
  lookup: &F,
  key: &str,
) -> Option<usize>
where
  F: Fn(&str) -> Option<String>,
{
  let raw = lookup(key)?;
  match raw.trim().parse::<usize>() {
    Ok(value) => Some(value),
    Err(err) => {
      log::warn!("ignoring {key}={raw:?}: {err}");
      None
    }
  }
}
