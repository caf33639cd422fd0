//! Cursor over an [`EventStore`]. Cheap to construct and copy around: the
//! common range cursor is two `usize`s plus a borrow, no heap allocation.

use std::rc::Rc;
use std::sync::Arc;

use super::{
  EventStore, NO_PARENT, OFF_ARGUMENTS, OFF_CHILD_TIME, OFF_DEPTH, OFF_END_TIME, OFF_ID,
  OFF_NEXT_SIBLING, OFF_PARENT, OFF_SYSTEM_TIME, OFF_TAG, OFF_TIME, OFF_TYPE,
};
use crate::arguments::ArgValue;
use crate::arguments::ArgumentData;
use crate::event_type::{EventType, EventTypeFlags};

#[derive(Clone)]
enum Cursor {
  /// A contiguous row range `[lo, hi)` in store order.
  Range { lo: usize, hi: usize },
  /// An arbitrary ordering over rows, e.g. a query result set.
  Indirect(Rc<[usize]>),
}

/// A read cursor into an [`EventStore`], optionally ordered by an
/// indirection table rather than raw row order.
///
/// Invalidated by the next `rebuild()` or any `insert()` that grows the
/// backing buffer; holding one across either is a logic error in the
/// caller, not something this type detects.
#[derive(Clone)]
pub struct EventIterator<'a> {
  store: &'a EventStore,
  cursor: Cursor,
  pos: usize,
}

impl<'a> EventIterator<'a> {
  pub(super) fn range(store: &'a EventStore, lo: usize, hi: usize) -> Self {
    Self { store, cursor: Cursor::Range { lo, hi }, pos: 0 }
  }

  pub(crate) fn indirect(store: &'a EventStore, order: Rc<[usize]>) -> Self {
    Self { store, cursor: Cursor::Indirect(order), pos: 0 }
  }

  fn len(&self) -> usize {
    match &self.cursor {
      Cursor::Range { lo, hi } => hi.saturating_sub(*lo),
      Cursor::Indirect(order) => order.len(),
    }
  }

  fn row(&self) -> usize {
    match &self.cursor {
      Cursor::Range { lo, .. } => lo + self.pos,
      Cursor::Indirect(order) => order[self.pos],
    }
  }

  fn cell(&self, offset: usize) -> u32 {
    self.store.cell(self.row(), offset)
  }

  pub fn done(&self) -> bool {
    self.pos >= self.len()
  }

  pub fn next(&mut self) {
    if !self.done() {
      self.pos += 1;
    }
  }

  /// Repositions at row `row`, or past-the-end if `row` isn't reachable
  /// from this cursor's ordering.
  pub fn seek(&mut self, row: usize) {
    match &self.cursor {
      Cursor::Range { lo, hi } => {
        self.pos = if row >= *lo && row < *hi { row - lo } else { self.len() };
      }
      Cursor::Indirect(order) => {
        self.pos = order.iter().position(|&r| r == row).unwrap_or(order.len());
      }
    }
  }

  /// Advances to the next record whose `END_TIME` cell is non-zero.
  pub fn next_scope(&mut self) {
    self.next();
    while !self.done() && self.cell(OFF_END_TIME) == 0 {
      self.next();
    }
  }

  /// Advances to the next record whose `END_TIME` cell is zero.
  pub fn next_instance(&mut self) {
    self.next();
    while !self.done() && self.cell(OFF_END_TIME) != 0 {
      self.next();
    }
  }

  pub fn next_sibling(&mut self) {
    if self.done() {
      return;
    }
    let ns = self.cell(OFF_NEXT_SIBLING);
    if ns == 0 {
      self.pos = self.len();
    } else {
      self.seek(ns as usize);
    }
  }

  pub fn move_to_parent(&mut self) {
    if self.done() {
      return;
    }
    let parent = self.cell(OFF_PARENT);
    if parent == NO_PARENT {
      self.pos = self.len();
    } else {
      self.seek(parent as usize);
    }
  }

  /// Returns an iterator at this record's parent, or `None` at a root.
  /// `fast` is accepted for contract compatibility; the range cursor it
  /// returns carries no allocation to begin with, so there is nothing
  /// further for the fast path to skip.
  pub fn parent(&self, _fast: bool) -> Option<Self> {
    let parent = self.cell(OFF_PARENT);
    if parent == NO_PARENT {
      return None;
    }
    Some(Self { store: self.store, cursor: Cursor::Range { lo: 0, hi: self.store.count }, pos: parent as usize })
  }

  pub fn id(&self) -> u32 {
    self.cell(OFF_ID)
  }

  pub fn type_id(&self) -> u32 {
    self.cell(OFF_TYPE)
  }

  pub fn event_type(&self) -> Option<EventType> {
    self.store.type_table.borrow().by_id(self.type_id())
  }

  pub fn type_flags(&self) -> EventTypeFlags {
    self.event_type().map(|t| t.flags).unwrap_or(EventTypeFlags::NONE)
  }

  pub fn name(&self) -> Arc<str> {
    self.event_type().map(|t| t.name).unwrap_or_else(|| Arc::from(""))
  }

  /// Whether this record has a non-zero `END_TIME`, i.e. was closed by a
  /// matching leave event. Record-level, not type-level: an on-demand
  /// scope type that never saw its leave event reads as an instance.
  pub fn is_scope(&self) -> bool {
    self.cell(OFF_END_TIME) != 0
  }

  pub fn is_instance(&self) -> bool {
    !self.is_scope()
  }

  pub fn depth(&self) -> u32 {
    self.cell(OFF_DEPTH)
  }

  pub fn time_ms(&self) -> f64 {
    self.cell(OFF_TIME) as f64 / 1000.0
  }

  pub fn end_time_ms(&self) -> f64 {
    self.cell(OFF_END_TIME) as f64 / 1000.0
  }

  pub fn total_duration_ms(&self) -> f64 {
    self.end_time_ms() - self.time_ms()
  }

  pub fn user_duration_ms(&self) -> f64 {
    self.total_duration_ms() - (self.cell(OFF_SYSTEM_TIME) as f64 / 1000.0)
  }

  pub fn own_duration_ms(&self) -> f64 {
    self.total_duration_ms() - (self.cell(OFF_CHILD_TIME) as f64 / 1000.0)
  }

  pub fn arguments(&self) -> Option<&'a ArgumentData> {
    self.store.arguments.get(self.cell(OFF_ARGUMENTS))
  }

  pub fn argument(&self, key: &str) -> Option<&'a ArgValue> {
    self.arguments()?.get(key)
  }

  pub fn get_tag(&self) -> u32 {
    self.cell(OFF_TAG)
  }

  /// Writes the application-defined tag cell. Mutable through a shared
  /// cursor: `TAG` is the one column callers are meant to scratch on
  /// while otherwise just reading.
  pub fn set_tag(&self, value: u32) {
    self.store.set_cell(self.row(), OFF_TAG, value);
  }
}
