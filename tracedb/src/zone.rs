//! # Zone
//!
//! A single logical event stream, typically one thread or isolate in the
//! source recording, paired with its own event store and the ancillary
//! indexes registered against it. A [`crate::database::Database`] owns any
//! number of zones; each is independent, so one zone's malformed batch
//! never disturbs another's state.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ancillary::{AncillaryIndex, FrameList, MarkList, TimeRangeList};
use crate::event_store::EventStore;
use crate::event_type::EventTypeTable;

/// Notified once per successful `commit_batch`, after every ancillary
/// index registered on the zone has finished its rebuild. Mirrors the
/// shape of [`crate::ancillary::AncillaryIndex`]: declare nothing, just
/// react to the one event a zone ever emits.
pub trait ZoneListener {
  fn on_invalidated(&self, zone_name: &str);
}

/// What kind of thing a zone's events came from. Mirrors the distinction
/// painters care about when choosing a default lane layout; the core
/// itself treats every variant identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneType {
  Thread,
  Isolate,
  Process,
  Other,
}

pub struct Zone {
  pub name: String,
  pub zone_type: ZoneType,
  pub location: String,
  store: EventStore,
  frames: Rc<RefCell<FrameList>>,
  marks: Rc<RefCell<MarkList>>,
  time_ranges: Rc<RefCell<TimeRangeList>>,
  /// Set when the store's capacity exceeds what this zone can keep
  /// serving; existing data remains readable but no further ingestion
  /// is attempted (§7 resource exhaustion).
  invalid: bool,
  /// Record count at the start of the batch currently being ingested;
  /// `discard_batch` rolls back to this mark on a source-parse failure.
  batch_start: usize,
  listeners: Vec<Rc<dyn ZoneListener>>,
}

impl Zone {
  pub fn new(
    name: impl Into<String>,
    zone_type: ZoneType,
    location: impl Into<String>,
    type_table: Rc<RefCell<EventTypeTable>>,
  ) -> Self {
    let mut store = EventStore::new(type_table.clone());
    crate::event_store::register_builtin_types(&mut type_table.borrow_mut());
    crate::ancillary::frame_list::register_builtin_types(&mut type_table.borrow_mut());
    crate::ancillary::mark_list::register_builtin_types(&mut type_table.borrow_mut());
    crate::ancillary::time_range_list::register_builtin_types(&mut type_table.borrow_mut());

    let frames = Rc::new(RefCell::new(FrameList::new()));
    let marks = Rc::new(RefCell::new(MarkList::new()));
    let time_ranges = Rc::new(RefCell::new(TimeRangeList::new()));
    store.register_ancillary(&(frames.clone() as Rc<RefCell<dyn AncillaryIndex>>));
    store.register_ancillary(&(marks.clone() as Rc<RefCell<dyn AncillaryIndex>>));
    store.register_ancillary(&(time_ranges.clone() as Rc<RefCell<dyn AncillaryIndex>>));

    Self {
      name: name.into(),
      zone_type,
      location: location.into(),
      store,
      frames,
      marks,
      time_ranges,
      invalid: false,
      batch_start: 0,
      listeners: Vec::new(),
    }
  }

  pub fn store(&self) -> &EventStore {
    &self.store
  }

  pub fn store_mut(&mut self) -> &mut EventStore {
    &mut self.store
  }

  pub fn frames(&self) -> &Rc<RefCell<FrameList>> {
    &self.frames
  }

  pub fn marks(&self) -> &Rc<RefCell<MarkList>> {
    &self.marks
  }

  pub fn time_ranges(&self) -> &Rc<RefCell<TimeRangeList>> {
    &self.time_ranges
  }

  pub fn is_valid(&self) -> bool {
    !self.invalid
  }

  pub fn mark_invalid(&mut self) {
    self.invalid = true;
  }

  /// Registers an additional, caller-supplied ancillary index against
  /// this zone's store. Late registration against a non-empty store
  /// triggers an immediate single-index rebuild (see
  /// `EventStore::register_ancillary`).
  pub fn register_ancillary(&mut self, index: &Rc<RefCell<dyn AncillaryIndex>>) {
    self.store.register_ancillary(index);
  }

  pub fn add_listener(&mut self, listener: Rc<dyn ZoneListener>) {
    self.listeners.push(listener);
  }

  /// Marks the current store length as the batch boundary, so a
  /// subsequent `discard_batch` knows how far back to roll.
  pub fn begin_batch(&mut self) {
    self.batch_start = self.store.count();
  }

  /// Drops every record appended since `begin_batch`: the zone is left
  /// exactly as of its last commit (§7 source-parse failure).
  pub fn discard_batch(&mut self) {
    self.store.truncate(self.batch_start);
  }

  /// Sorts, re-scopes, and runs every ancillary index, then notifies
  /// this zone's listeners. Advances the batch mark to the new count so
  /// a following `begin_batch`/`discard_batch` pair only rolls back the
  /// next batch.
  pub fn commit_batch(&mut self) {
    self.store.rebuild();
    self.batch_start = self.store.count();
    for listener in &self.listeners {
      listener.on_invalidated(&self.name);
    }
  }
}
