use std::{env, process::ExitCode};

use kralloc::{Config, Heap, Ptr, UNIT};

/// Mirrors a C `struct { int i1; int i2; }`.
const RECORD_SIZE: usize = 2 * size_of::<i32>();

/// Prints every log record as `[LEVEL][file:line] message`, the same shape the
/// heap reporter uses for the call sites it receives.
fn setup_logging() -> Result<(), log::SetLoggerError> {
  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "[{}][{}:{}] {}",
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        message
      ))
    })
    .level(log::LevelFilter::Debug)
    .chain(std::io::stdout())
    .apply()
}

/// First character of `arg` as a digit, `'7'` becoming 7.
fn leading_digit(arg: &str) -> Option<i32> {
  arg.chars().next()?.to_digit(10).map(|digit| digit as i32)
}

fn main() -> ExitCode {
  if let Err(err) = setup_logging() {
    eprintln!("logging unavailable: {err}");
  }

  let args: Vec<String> = env::args().skip(1).collect();
  let (Some(first), Some(second), 2) = (
    args.first().and_then(|arg| leading_digit(arg)),
    args.get(1).and_then(|arg| leading_digit(arg)),
    args.len(),
  ) else {
    println!("ERROR: Expected input in form of 2 integers.");
    return ExitCode::FAILURE;
  };

  let mut heap = Heap::with_config(Config::from_env());

  // --------------------------------------------------------------------
  // 1) Allocate a two-field record and use it.
  // --------------------------------------------------------------------
  println!("Allocating memory for a new struct...");
  let record = match heap.allocate(RECORD_SIZE) {
    Ok(ptr) => ptr,
    Err(err) => {
      println!("Malloc failed: {err}");
      return ExitCode::FAILURE;
    }
  };

  println!("Malloc succeeded at {record}, adding data...");
  if let Some(payload) = heap.payload_mut(record) {
    payload[..4].copy_from_slice(&first.to_ne_bytes());
    payload[4..8].copy_from_slice(&second.to_ne_bytes());
  }

  println!("Data added. Trying to access...");
  if let Some(payload) = heap.payload(record) {
    let mut field = [0u8; 4];
    field.copy_from_slice(&payload[..4]);
    println!("First datum: {}", i32::from_ne_bytes(field));
    field.copy_from_slice(&payload[4..8]);
    println!("Second datum: {}", i32::from_ne_bytes(field));
  }

  println!("Program break is now {} bytes", heap.program_break());

  // --------------------------------------------------------------------
  // 2) Give it back.
  // --------------------------------------------------------------------
  println!("Freeing struct...");
  if let Err(err) = heap.free(record) {
    println!("Unexpected: {err}");
  }

  // --------------------------------------------------------------------
  // 3) Errors. Each one is reported with this file and line and leaves the
  //    heap as it was.
  // --------------------------------------------------------------------
  println!("Now, let's test some errors...");

  println!("First error test...");
  if let Err(err) = heap.free(record) {
    println!("Rejected: {err}");
  }

  println!("Second error test...");
  // Something that was never handed out: one byte into the record's payload.
  let stray = Ptr::from_offset(record.offset() + 1);
  if let Err(err) = heap.free(stray) {
    println!("Rejected: {err}");
  }

  // A well aligned offset in the middle of free memory.
  let inside = Ptr::from_offset(record.offset().saturating_sub(4 * UNIT));
  if let Err(err) = heap.free(inside) {
    println!("Rejected: {err}");
  }

  let stats = heap.stats();
  println!(
    "Arena: {} units, {} free in {} block(s), {} growth(s)",
    stats.arena_units, stats.free_units, stats.free_blocks, stats.growths
  );

  println!("Exiting...");
  ExitCode::SUCCESS
}
