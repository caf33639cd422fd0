//! Frame index: pairs `wtf.timing#frameStart` / `wtf.timing#frameEnd`
//! instance events, keyed by their `number` argument, into dense
//! [`Frame`] records a painter can binary-search by time.

use std::collections::HashMap;

use super::AncillaryIndex;
use crate::arguments::ArgValue;
use crate::event_store::EventIterator;
use crate::event_type::{EventType, EventTypeDesc, EventTypeTable};

/// One rendered frame, bounded by its start and end instance events.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub number: i64,
  pub start_time_ms: f64,
  pub end_time_ms: f64,
}

const FRAME_START: &str = "wtf.timing#frameStart";
const FRAME_END: &str = "wtf.timing#frameEnd";

#[derive(Debug, Default)]
pub struct FrameList {
  by_number: HashMap<i64, (Option<f64>, Option<f64>)>,
  frames: Vec<Frame>,
}

impl FrameList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self) -> usize {
    self.frames.len()
  }

  pub fn frames(&self) -> &[Frame] {
    &self.frames
  }

  /// The frame whose [start, end) span contains `time_ms`, if any.
  /// Frames are stored sorted by start time, so this binary-searches.
  pub fn frame_at_time(&self, time_ms: f64) -> Option<&Frame> {
    let idx = self
      .frames
      .partition_point(|f| f.start_time_ms <= time_ms);
    if idx == 0 {
      return None;
    }
    let candidate = &self.frames[idx - 1];
    if time_ms < candidate.end_time_ms {
      Some(candidate)
    } else {
      None
    }
  }
}

fn frame_number(iter: &EventIterator) -> Option<i64> {
  match iter.argument("number")? {
    ArgValue::Int(n) => Some(*n),
    ArgValue::Double(d) => Some(*d as i64),
    _ => None,
  }
}

impl AncillaryIndex for FrameList {
  fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<EventType>> {
    self.by_number.clear();
    vec![
      type_table.by_name(FRAME_START),
      type_table.by_name(FRAME_END),
    ]
  }

  fn handle_event(&mut self, type_index: usize, _event_type: &EventType, iter: &mut EventIterator) {
    let Some(number) = frame_number(iter) else {
      return;
    };
    let entry = self.by_number.entry(number).or_insert((None, None));
    match type_index {
      0 => entry.0 = Some(iter.time_ms()),
      1 => entry.1 = Some(iter.time_ms()),
      _ => unreachable!("FrameList only declares two subscriptions"),
    }
  }

  fn end_rebuild(&mut self) {
    self.frames.clear();
    let mut numbers: Vec<_> = self.by_number.keys().copied().collect();
    numbers.sort_unstable();
    for number in numbers {
      if let (Some(start), Some(end)) = self.by_number[&number] {
        self.frames.push(Frame {
          number,
          start_time_ms: start,
          end_time_ms: end,
        });
      }
    }
    self.frames
      .sort_by(|a, b| a.start_time_ms.partial_cmp(&b.start_time_ms).unwrap());
  }
}

/// Pre-declares the builtin frame marker types on a fresh database so
/// `FrameList::begin_rebuild` always finds them, even before any frame has
/// been recorded.
pub fn register_builtin_types(type_table: &mut EventTypeTable) {
  type_table.define(EventTypeDesc::instance(FRAME_START));
  type_table.define(EventTypeDesc::instance(FRAME_END));
}
