//! Time-range index: pairs `wtf.timeRange#begin` / `wtf.timeRange#end`,
//! keyed by an `id` argument, into named spans. Same shape as
//! [`super::frame_list::FrameList`]; unlike frames, ranges may legitimately
//! overlap, so no binary-search accessor is offered; callers scan
//! [`TimeRangeList::ranges`] directly.

use std::collections::HashMap;

use super::AncillaryIndex;
use crate::arguments::ArgValue;
use crate::event_store::EventIterator;
use crate::event_type::{EventType, EventTypeDesc, EventTypeTable};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
  pub id: i64,
  pub name: String,
  pub start_time_ms: f64,
  pub end_time_ms: f64,
}

const RANGE_BEGIN: &str = "wtf.timeRange#begin";
const RANGE_END: &str = "wtf.timeRange#end";

#[derive(Debug, Default)]
struct Pending {
  name: Option<String>,
  start: Option<f64>,
  end: Option<f64>,
}

#[derive(Debug, Default)]
pub struct TimeRangeList {
  by_id: HashMap<i64, Pending>,
  ranges: Vec<TimeRange>,
}

impl TimeRangeList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self) -> usize {
    self.ranges.len()
  }

  pub fn ranges(&self) -> &[TimeRange] {
    &self.ranges
  }
}

fn range_id(iter: &EventIterator) -> Option<i64> {
  match iter.argument("id")? {
    ArgValue::Int(n) => Some(*n),
    ArgValue::Double(d) => Some(*d as i64),
    _ => None,
  }
}

fn range_name(iter: &EventIterator) -> Option<String> {
  match iter.argument("name")? {
    ArgValue::String(s) => Some(s.to_string()),
    _ => None,
  }
}

impl AncillaryIndex for TimeRangeList {
  fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<EventType>> {
    self.by_id.clear();
    vec![type_table.by_name(RANGE_BEGIN), type_table.by_name(RANGE_END)]
  }

  fn handle_event(&mut self, type_index: usize, _event_type: &EventType, iter: &mut EventIterator) {
    let Some(id) = range_id(iter) else { return };
    let entry = self.by_id.entry(id).or_default();
    match type_index {
      0 => {
        entry.start = Some(iter.time_ms());
        if entry.name.is_none() {
          entry.name = range_name(iter);
        }
      }
      1 => entry.end = Some(iter.time_ms()),
      _ => unreachable!("TimeRangeList only declares two subscriptions"),
    }
  }

  fn end_rebuild(&mut self) {
    self.ranges.clear();
    let mut ids: Vec<_> = self.by_id.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
      let pending = &self.by_id[&id];
      if let (Some(start), Some(end)) = (pending.start, pending.end) {
        self.ranges.push(TimeRange {
          id,
          name: pending.name.clone().unwrap_or_default(),
          start_time_ms: start,
          end_time_ms: end,
        });
      }
    }
    self.ranges
      .sort_by(|a, b| a.start_time_ms.partial_cmp(&b.start_time_ms).unwrap());
  }
}

pub fn register_builtin_types(type_table: &mut EventTypeTable) {
  type_table.define(EventTypeDesc::instance(RANGE_BEGIN));
  type_table.define(EventTypeDesc::instance(RANGE_END));
}
