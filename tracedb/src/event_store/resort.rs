//! Phase 1: resort by `(TIME, original insertion order)` and renumber IDs.
//!
//! A record's pre-sort `ID` cell equals its insertion-order row (see
//! `EventStore::insert`), and is never touched again until this runs, so
//! it doubles as the "original ID" tie-break the invariant calls for,
//! with no separate bookkeeping column needed. Because row numbers are
//! never reused across rebuilds, a record surviving from a previous
//! rebuild always tie-breaks before one inserted since, which is exactly
//! "original insertion order" read across the store's whole lifetime.

use std::cell::Cell;

use super::{EventStore, OFF_ID, OFF_TIME, STRUCT_SIZE};

pub(super) fn resort(store: &mut EventStore) {
  let n = store.count;
  if n == 0 {
    store.first_time_us = 0;
    store.last_time_us = 0;
    return;
  }

  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| {
    let time_a = store.cell(a, OFF_TIME);
    let time_b = store.cell(b, OFF_TIME);
    time_a
      .cmp(&time_b)
      .then_with(|| store.cell(a, OFF_ID).cmp(&store.cell(b, OFF_ID)))
  });

  let mut new_cells: Vec<Cell<u32>> = Vec::with_capacity(store.capacity * STRUCT_SIZE);
  for &old_row in &order {
    for offset in 0..STRUCT_SIZE {
      new_cells.push(Cell::new(store.cell(old_row, offset)));
    }
  }
  new_cells.resize_with(store.capacity * STRUCT_SIZE, || Cell::new(0));
  for new_row in 0..n {
    new_cells[new_row * STRUCT_SIZE + OFF_ID].set(new_row as u32);
  }
  store.cells = new_cells;

  store.first_time_us = store.cell(0, super::OFF_TIME) as u64;
  let last_end = store.cell(n - 1, super::OFF_END_TIME);
  store.last_time_us = if last_end > 0 {
    last_end as u64
  } else {
    store.cell(n - 1, super::OFF_TIME) as u64
  };
}
