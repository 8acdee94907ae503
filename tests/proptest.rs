/*
 * proptest.rs
 *
 * property-based tests for the heap. random allocate/free sequences, checked
 * against the invariants that must hold after every single step.
 */

use proptest::prelude::*;

use kralloc::{BufferHost, Config, ErrorKind, Heap, Ptr, Recorder, UNIT};

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  /// Frees the live allocation at this index, modulo the live count.
  Free(usize),
  /// Frees something that is already gone.
  FreeAgain(usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (0usize..400).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Free),
    1 => any::<usize>().prop_map(Op::FreeAgain),
  ]
}

fn heap(min_growth: usize) -> Heap<BufferHost, Recorder> {
  let config = Config {
    min_growth,
    arena_limit: 1 << 22,
  };
  Heap::with_parts(BufferHost::new(config.arena_limit), config, Recorder::new())
}

/// Units a live allocation occupies, header included.
fn units_of(
  heap: &Heap<BufferHost, Recorder>,
  ptr: Ptr,
) -> usize {
  heap.usable_size(ptr).map_or(0, |bytes| bytes / UNIT + 1)
}

/* ============================================================================
 * Arena and free-list invariants
 * ============================================================================ */

proptest! {
  #![proptest_config(ProptestConfig::with_cases(256))]

  /* arena never shrinks and only grows together with the growth counter */
  #[test]
  fn arena_size_is_monotonic(
    min_growth in 1usize..64,
    ops in prop::collection::vec(op(), 1..200),
  ) {
    let mut heap = heap(min_growth);
    let mut live: Vec<Ptr> = Vec::new();
    let mut before = heap.stats();

    for op in ops {
      match op {
        Op::Allocate(nbytes) => live.push(heap.allocate(nbytes).unwrap()),
        Op::Free(index) if !live.is_empty() => {
          let ptr = live.swap_remove(index % live.len());
          heap.free(ptr).unwrap();
        }
        _ => {}
      }

      let after = heap.stats();
      prop_assert!(after.arena_units >= before.arena_units);
      if after.arena_units > before.arena_units {
        prop_assert!(after.growths > before.growths);
      } else {
        prop_assert_eq!(after.growths, before.growths);
      }
      before = after;
    }
  }

  /* free and live blocks tile the arena, and no two free blocks touch */
  #[test]
  fn blocks_tile_the_arena(
    min_growth in 1usize..64,
    ops in prop::collection::vec(op(), 1..200),
  ) {
    let mut heap = heap(min_growth);
    let mut live: Vec<Ptr> = Vec::new();

    for op in ops {
      match op {
        Op::Allocate(nbytes) => live.push(heap.allocate(nbytes).unwrap()),
        Op::Free(index) if !live.is_empty() => {
          let ptr = live.swap_remove(index % live.len());
          heap.free(ptr).unwrap();
        }
        _ => {}
      }

      let stats = heap.stats();
      let live_units: usize = live.iter().map(|ptr| units_of(&heap, *ptr)).sum();
      prop_assert_eq!(stats.free_units + live_units, stats.arena_units);

      let free = heap.free_blocks();
      for pair in free.windows(2) {
        prop_assert!(pair[0].offset + pair[0].units * UNIT < pair[1].offset);
      }
    }
  }

  /* payloads never overlap: each one keeps the pattern written into it */
  #[test]
  fn payloads_keep_their_contents(
    ops in prop::collection::vec(op(), 1..150),
  ) {
    let mut heap = heap(32);
    let mut live: Vec<(Ptr, u8)> = Vec::new();
    let mut stamp = 0u8;

    for op in ops {
      match op {
        Op::Allocate(nbytes) => {
          let ptr = heap.allocate(nbytes).unwrap();
          stamp = stamp.wrapping_add(1);
          heap.payload_mut(ptr).unwrap().fill(stamp);
          live.push((ptr, stamp));
        }
        Op::Free(index) if !live.is_empty() => {
          let (ptr, expected) = live.swap_remove(index % live.len());
          prop_assert!(heap.payload(ptr).unwrap().iter().all(|byte| *byte == expected));
          heap.free(ptr).unwrap();
        }
        _ => {}
      }
    }

    for (ptr, expected) in live {
      prop_assert!(heap.payload(ptr).unwrap().iter().all(|byte| *byte == expected));
    }
  }

  /* a rejected free never touches the free list */
  #[test]
  fn rejected_frees_change_nothing(
    ops in prop::collection::vec(op(), 1..150),
    stray in any::<usize>(),
  ) {
    let mut heap = heap(16);
    let mut live: Vec<Ptr> = Vec::new();
    let mut dead: Vec<Ptr> = Vec::new();

    for op in ops {
      match op {
        Op::Allocate(nbytes) => {
          let ptr = heap.allocate(nbytes).unwrap();
          dead.retain(|gone| *gone != ptr);
          live.push(ptr);
        }
        Op::Free(index) if !live.is_empty() => {
          let ptr = live.swap_remove(index % live.len());
          heap.free(ptr).unwrap();
          dead.push(ptr);
        }
        Op::FreeAgain(index) if !dead.is_empty() => {
          // Headers are only ever written where a pointer is handed out, so
          // a dead pointer keeps its Freed tag until it is handed out again.
          let ptr = dead[index % dead.len()];
          let snapshot = heap.free_blocks();
          let err = heap.free(ptr).unwrap_err();
          prop_assert_eq!(err.kind(), ErrorKind::DoubleFree);
          prop_assert_eq!(heap.free_blocks(), snapshot);
        }
        _ => {}
      }
    }

    // Odd offsets are never payloads.
    let snapshot = heap.free_blocks();
    prop_assert!(heap.free(Ptr::from_offset(stray | 1)).is_err());
    prop_assert_eq!(heap.free_blocks(), snapshot);
  }
}

/* ============================================================================
 * Next-fit reuse
 * ============================================================================ */

proptest! {
  /* free then allocate the same size hands back the same pointer, as long as
   * everything fits in the first growth */
  #[test]
  fn same_size_is_reused(
    sizes in prop::collection::vec(0usize..2000, 1..20),
  ) {
    let mut heap = heap(1 << 16);

    for nbytes in sizes {
      let ptr = heap.allocate(nbytes).unwrap();
      heap.free(ptr).unwrap();
      prop_assert_eq!(heap.allocate(nbytes).unwrap(), ptr);
    }
  }
}
