//! # Event Store
//!
//! A packed, growable column buffer of fixed-width event records plus the
//! cursor that reads it. `insert` appends records in arbitrary order;
//! `rebuild` sorts them, reconstructs scope nesting, and notifies every
//! registered ancillary index. Between rebuilds the store is append-only
//! and unordered; readers only ever see the result of the last completed
//! rebuild.

mod __test__;
pub mod iterator;
mod resort;
mod scope;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub use iterator::EventIterator;

use crate::ancillary::AncillaryIndex;
use crate::arguments::{ArgumentData, ArgumentTable};
use crate::event_type::EventTypeTable;

/// Cells per record. Normative: the column buffer is laid out exactly as
/// described below, not as an implementation detail.
pub const STRUCT_SIZE: usize = 12;

pub const OFF_ID: usize = 0;
pub const OFF_TYPE: usize = 1;
pub const OFF_PARENT: usize = 2;
pub const OFF_DEPTH: usize = 3;
pub const OFF_TIME: usize = 4;
pub const OFF_NEXT_SIBLING: usize = 5;
pub const OFF_ARGUMENTS: usize = 6;
pub const OFF_VALUE: usize = 7;
pub const OFF_TAG: usize = 8;
pub const OFF_END_TIME: usize = 9;
pub const OFF_SYSTEM_TIME: usize = 10;
pub const OFF_CHILD_TIME: usize = 11;

/// PARENT sentinel for a root record. Chosen distinct from valid index `0`
/// (which is always a real root slot) to avoid the ambiguity the wire
/// format's `0`-as-parent-or-absent convention would otherwise create;
/// `NEXT_SIBLING` keeps the wire's `0` sentinel since record `0`, being
/// first in time order, can never legitimately be anyone's next sibling.
pub const NO_PARENT: u32 = u32::MAX;

const MIN_CAPACITY: usize = 1024;

const TYPE_SCOPE_ENTER: &str = "wtf.scope#enter";
const TYPE_SCOPE_LEAVE: &str = "wtf.scope#leave";
const TYPE_SCOPE_APPEND_DATA: &str = "wtf.scope#appendData";
const TYPE_TRACE_TIME_STAMP: &str = "wtf.trace#timeStamp";

/// Registers the wire-level marker types the rescoper dispatches on. Safe
/// to call repeatedly; `define` is idempotent by name.
pub fn register_builtin_types(type_table: &mut EventTypeTable) {
  use crate::event_type::{EventTypeDesc, EventTypeFlags};
  let internal = EventTypeFlags::INTERNAL | EventTypeFlags::BUILTIN;
  type_table.define(EventTypeDesc::instance(TYPE_SCOPE_ENTER).with_flags(internal));
  type_table.define(EventTypeDesc::instance(TYPE_SCOPE_LEAVE).with_flags(internal));
  type_table.define(EventTypeDesc::instance(TYPE_SCOPE_APPEND_DATA).with_flags(internal));
  type_table.define(EventTypeDesc::instance(TYPE_TRACE_TIME_STAMP).with_flags(internal));
}

/// A growable packed event-record buffer for a single zone.
pub struct EventStore {
  cells: Vec<Cell<u32>>, // len == capacity * STRUCT_SIZE; Cell so TAG can be mutated through a shared iterator
  capacity: usize,
  count: usize,
  arguments: ArgumentTable,
  type_table: Rc<RefCell<EventTypeTable>>,
  first_time_us: u64,
  last_time_us: u64,
  max_depth: u32,
  ancillaries: Vec<Weak<RefCell<dyn AncillaryIndex>>>,
}

impl EventStore {
  pub fn new(type_table: Rc<RefCell<EventTypeTable>>) -> Self {
    Self {
      cells: (0..MIN_CAPACITY * STRUCT_SIZE).map(|_| Cell::new(0)).collect(),
      capacity: MIN_CAPACITY,
      count: 0,
      arguments: ArgumentTable::new(),
      type_table,
      first_time_us: 0,
      last_time_us: 0,
      max_depth: 0,
      ancillaries: Vec::new(),
    }
  }

  pub fn count(&self) -> usize {
    self.count
  }

  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  pub fn max_depth(&self) -> u32 {
    self.max_depth
  }

  pub fn first_time_ms(&self) -> f64 {
    self.first_time_us as f64 / 1000.0
  }

  pub fn last_time_ms(&self) -> f64 {
    self.last_time_us as f64 / 1000.0
  }

  pub fn arguments(&self) -> &ArgumentTable {
    &self.arguments
  }

  pub fn type_table(&self) -> &Rc<RefCell<EventTypeTable>> {
    &self.type_table
  }

  fn cell(&self, row: usize, offset: usize) -> u32 {
    self.cells[row * STRUCT_SIZE + offset].get()
  }

  #[cfg(test)]
  pub(crate) fn cell_for_test(&self, row: usize, offset: usize) -> u32 {
    self.cell(row, offset)
  }

  fn set_cell(&self, row: usize, offset: usize, value: u32) {
    self.cells[row * STRUCT_SIZE + offset].set(value);
  }

  /// Grows the backing buffer to hold at least `needed` rows, doubling
  /// from the current capacity. Uses `try_reserve` rather than the
  /// infallible `Vec` growth path so a pathologically large store can
  /// report exhaustion to the owning zone instead of aborting the
  /// process (§7 resource exhaustion).
  fn ensure_capacity(&mut self, needed: usize) -> Result<(), String> {
    if needed <= self.capacity {
      return Ok(());
    }
    let mut new_capacity = self.capacity.max(MIN_CAPACITY);
    while new_capacity < needed {
      new_capacity *= 2;
    }
    let mut new_cells: Vec<Cell<u32>> = Vec::new();
    new_cells
      .try_reserve_exact(new_capacity * STRUCT_SIZE)
      .map_err(|e| format!("could not grow store to {new_capacity} records: {e}"))?;
    for c in &self.cells {
      new_cells.push(Cell::new(c.get()));
    }
    new_cells.resize_with(new_capacity * STRUCT_SIZE, || Cell::new(0));
    self.cells = new_cells;
    self.capacity = new_capacity;
    Ok(())
  }

  /// Appends an unsorted record. `type_id` is looked up in the shared
  /// event-type table by the caller beforehand (or is one of the builtin
  /// wire-marker ids); `time_us` is the event's occurrence time.
  /// Returns the record's pre-sort row, which also doubles as its
  /// lifetime-unique insertion sequence number (see `resort`).
  ///
  /// Fails only if the backing buffer cannot grow to fit the new record;
  /// the store is left exactly as it was before the call.
  pub fn insert(&mut self, type_id: u32, time_us: u64, args: Option<ArgumentData>) -> Result<u32, String> {
    self.ensure_capacity(self.count + 1)?;
    let row = self.count;
    let arg_id = args.map(|a| self.arguments.intern(a)).unwrap_or(0);
    self.set_cell(row, OFF_ID, row as u32);
    self.set_cell(row, OFF_TYPE, type_id);
    self.set_cell(row, OFF_PARENT, NO_PARENT);
    self.set_cell(row, OFF_DEPTH, 0);
    self.set_cell(row, OFF_TIME, time_us as u32);
    self.set_cell(row, OFF_NEXT_SIBLING, 0);
    self.set_cell(row, OFF_ARGUMENTS, arg_id);
    self.set_cell(row, OFF_VALUE, 0);
    self.set_cell(row, OFF_TAG, 0);
    self.set_cell(row, OFF_END_TIME, 0);
    self.set_cell(row, OFF_SYSTEM_TIME, 0);
    self.set_cell(row, OFF_CHILD_TIME, 0);
    self.count += 1;
    Ok(row as u32)
  }

  /// Runs all three rebuild phases in sequence: resort, re-scope, then
  /// ancillary-index rebuild. Must run to completion; no iterator may be
  /// held across this call.
  pub fn rebuild(&mut self) {
    resort::resort(self);
    scope::rescope(self);
    self.rebuild_all_ancillaries();
  }

  fn live_ancillaries(&mut self) -> Vec<Rc<RefCell<dyn AncillaryIndex>>> {
    let mut live = Vec::with_capacity(self.ancillaries.len());
    self.ancillaries.retain(|weak| match weak.upgrade() {
      Some(strong) => {
        live.push(strong);
        true
      }
      None => false,
    });
    live
  }

  fn rebuild_all_ancillaries(&mut self) {
    for index in self.live_ancillaries() {
      self.rebuild_one_ancillary(&index);
    }
  }

  fn rebuild_one_ancillary(&self, index: &Rc<RefCell<dyn AncillaryIndex>>) {
    let type_table = self.type_table.borrow();
    let subscriptions = index.borrow_mut().begin_rebuild(&*type_table);
    drop(type_table);
    let mut iter = self.begin();
    while !iter.done() {
      let type_id = iter.type_id();
      for (type_index, subscribed) in subscriptions.iter().enumerate() {
        if let Some(ty) = subscribed {
          if ty.id == type_id {
            index.borrow_mut().handle_event(type_index, ty, &mut iter);
          }
        }
      }
      iter.next();
    }
    index.borrow_mut().end_rebuild();
  }

  /// Registers `index` for future rebuilds. If this store already holds
  /// committed (rebuilt) events, runs a single-index rebuild immediately
  /// so the index isn't left empty until the next batch.
  pub fn register_ancillary(&mut self, index: &Rc<RefCell<dyn AncillaryIndex>>) {
    self.ancillaries.push(Rc::downgrade(index));
    if self.count > 0 {
      self.rebuild_one_ancillary(index);
    }
  }

  pub fn unregister_ancillary(&mut self, index: &Rc<RefCell<dyn AncillaryIndex>>) {
    self.ancillaries.retain(|weak| match weak.upgrade() {
      Some(strong) => !Rc::ptr_eq(&strong, index),
      None => false,
    });
  }

  /// An iterator over the entire store in (post-rebuild) record order.
  pub fn begin(&self) -> EventIterator<'_> {
    EventIterator::range(self, 0, self.count)
  }

  /// A cursor over the whole store, positioned at `id`. Full-range (not
  /// bounded to just this one row) so the navigation ops in §4.3
  /// (`next_sibling`, `move_to_parent`, `next_scope`, `next_instance`)
  /// keep working from the returned cursor.
  pub fn get_event(&self, id: u32) -> Option<EventIterator<'_>> {
    let row = id as usize;
    if row >= self.count {
      return None;
    }
    let mut iter = EventIterator::range(self, 0, self.count);
    iter.seek(row);
    Some(iter)
  }

  pub fn begin_event_range(&self, lo: u32, hi: u32) -> EventIterator<'_> {
    let lo = (lo as usize).min(self.count);
    let hi = (hi as usize).min(self.count).max(lo);
    EventIterator::range(self, lo, hi)
  }

  /// Binary search for the largest row index with `TIME <= t_ms`; `0` if
  /// none (including on an empty store).
  pub fn index_of_event_near_time(&self, t_ms: f64) -> u32 {
    if self.count == 0 {
      return 0;
    }
    let t_us = (t_ms * 1000.0) as u32;
    let idx = (0..self.count).partition_point(|&row| self.cell(row, OFF_TIME) <= t_us);
    idx.saturating_sub(1) as u32
  }

  /// Walks parents from `index_of_event_near_time(t_ms)` up to depth 0;
  /// if that root scope spans `t_ms`, returns it, else falls back to the
  /// near-index itself. Lets a painter render a scope that began
  /// off-screen but still covers the viewport.
  pub fn index_of_root_scope_including_time(&self, t_ms: f64) -> u32 {
    let near = self.index_of_event_near_time(t_ms);
    if self.count == 0 {
      return near;
    }
    let t_us = (t_ms * 1000.0) as u32;
    let mut row = near as usize;
    while self.cell(row, OFF_DEPTH) > 0 {
      let parent = self.cell(row, OFF_PARENT);
      if parent == NO_PARENT {
        break;
      }
      row = parent as usize;
    }
    let end_time = self.cell(row, OFF_END_TIME);
    if end_time > 0 && end_time >= t_us {
      row as u32
    } else {
      near
    }
  }

  /// Rolls the store back to `count` records, discarding everything
  /// inserted since. Used to drop a partial batch when a data source
  /// fails mid-parse (§7): the zone is left exactly as of its last
  /// successful `rebuild`. Interned argument data for the discarded rows
  /// is not reclaimed; harmless, since argument ids are never reused.
  pub fn truncate(&mut self, count: usize) {
    self.count = count.min(self.count);
  }

  /// Composes the near-time and root-scope lookups into a range iterator
  /// starting either at the enclosing root scope or at the nearest event.
  pub fn begin_time_range(&self, start_ms: f64, end_ms: f64, from_root: bool) -> EventIterator<'_> {
    let lo = if from_root {
      self.index_of_root_scope_including_time(start_ms)
    } else {
      self.index_of_event_near_time(start_ms)
    };
    let hi = self.index_of_event_near_time(end_ms) + 1;
    self.begin_event_range(lo, hi)
  }
}
