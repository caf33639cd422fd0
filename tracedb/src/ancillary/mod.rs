//! # Ancillary Index Protocol
//!
//! A generic subscription contract by which derived lists, frames, marks,
//! time ranges, rebuild themselves from an [`crate::event_store::EventStore`]
//! after every ingestion batch. Mirrors the shape of a log listener: declare
//! interest, receive a callback per matching item, finalize.

mod __test__;
pub mod frame_list;
pub mod mark_list;
pub mod time_range_list;

use crate::event_store::EventIterator;
use crate::event_type::{EventType, EventTypeTable};

pub use frame_list::{Frame, FrameList};
pub use mark_list::{Mark, MarkList};
pub use time_range_list::{TimeRange, TimeRangeList};

/// Implemented by every derived index that rides along with an event
/// store's rebuild pass.
///
/// The three methods run in strict sequence once per `rebuild()`:
/// `begin_rebuild` declares interest, `handle_event` fires once per
/// matching record in post-sort order, `end_rebuild` finalizes and signals
/// invalidation.
pub trait AncillaryIndex {
  /// Declare the event types this index cares about. The position of
  /// each entry in the returned vector becomes its stable `type_index`
  /// handle, passed back on every matching `handle_event` call. A `None`
  /// slot means the named type has not been defined yet on this
  /// database; that type simply never matches during this rebuild.
  fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<EventType>>;

  /// Called once per record whose type matches `type_index`, in
  /// post-sort (time) order. The iterator is shared across all
  /// dispatches; implementations must read from it but never advance it.
  /// The driver re-seeks before each call.
  fn handle_event(&mut self, type_index: usize, event_type: &EventType, iter: &mut EventIterator);

  /// Finalize accumulated state and mark the index ready for reads. The
  /// owning zone emits `INVALIDATED` immediately after this returns.
  fn end_rebuild(&mut self);
}
