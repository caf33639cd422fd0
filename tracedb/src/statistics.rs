//! # Statistics Aggregator
//!
//! Per-event-type counters and latency histograms computed over a time
//! window and an optional predicate, across every zone in a database.
//! `INTERNAL`- and `BUILTIN`-flagged event types (the wire markers and
//! anything the core pre-declares for its own bookkeeping) never
//! contribute to the aggregate.


use crate::event_store::EventIterator;
use crate::event_type::EventTypeFlags;
use crate::zone::Zone;

const HISTOGRAM_BUCKETS: usize = 1000;
const OVERFLOW_BUCKET: usize = HISTOGRAM_BUCKETS - 1;

/// Aggregate for a scope-class event type: duration totals plus a 1-ms
/// resolution latency histogram.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
  pub name: String,
  pub flags: EventTypeFlags,
  pub count: u64,
  pub total_time_us: u64,
  pub user_time_us: u64,
  pub buckets: [u32; HISTOGRAM_BUCKETS],
}

impl ScopeEntry {
  fn new(name: String, flags: EventTypeFlags) -> Self {
    Self { name, flags, count: 0, total_time_us: 0, user_time_us: 0, buckets: [0; HISTOGRAM_BUCKETS] }
  }

  fn record(&mut self, user_duration_ms: f64, total_us: u64, user_us: u64) {
    self.count += 1;
    self.total_time_us += total_us;
    self.user_time_us += user_us;
    let bucket = (user_duration_ms.round() as i64).clamp(0, OVERFLOW_BUCKET as i64) as usize;
    self.buckets[bucket] += 1;
  }

  pub fn mean_time_us(&self) -> f64 {
    if self.count == 0 {
      return 0.0;
    }
    let numerator = if self.flags.contains(EventTypeFlags::SYSTEM_TIME) {
      self.total_time_us
    } else {
      self.user_time_us
    };
    numerator as f64 / self.count as f64
  }

  /// `count / (end - start)`, the window-relative event rate. The
  /// source returns a constant 0 here; this implementation picks the
  /// rate instead (see `DESIGN.md`).
  pub fn frequency(&self, window_ms: f64) -> f64 {
    if window_ms <= 0.0 {
      0.0
    } else {
      self.count as f64 / window_ms
    }
  }
}

/// Aggregate for an instance-class event type: just a count.
#[derive(Debug, Clone)]
pub struct InstanceEntry {
  pub name: String,
  pub count: u64,
}

impl InstanceEntry {
  pub fn frequency(&self, window_ms: f64) -> f64 {
    if window_ms <= 0.0 {
      0.0
    } else {
      self.count as f64 / window_ms
    }
  }
}

#[derive(Debug, Clone)]
pub enum StatEntry {
  Scope(ScopeEntry),
  Instance(InstanceEntry),
}

impl StatEntry {
  pub fn name(&self) -> &str {
    match self {
      StatEntry::Scope(e) => &e.name,
      StatEntry::Instance(e) => &e.name,
    }
  }

  pub fn count(&self) -> u64 {
    match self {
      StatEntry::Scope(e) => e.count,
      StatEntry::Instance(e) => e.count,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
  Count,
  TotalTime,
  MeanTime,
}

/// A predicate over events, used to exclude uninteresting records from
/// aggregation (e.g. restrict to one subsystem's event names).
pub type StatFilter<'a> = dyn Fn(&EventIterator) -> bool + 'a;

#[derive(Default)]
pub struct StatisticsAggregator {
  entries: Vec<StatEntry>,
  sorted_mode: Option<SortMode>,
}

impl StatisticsAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> &[StatEntry] {
    &self.entries
  }

  /// Walks every zone's `[start_ms, end_ms]` time range, skipping
  /// `INTERNAL`/`BUILTIN` events and anything `filter` rejects, folding
  /// the rest into per-type counters.
  pub fn rebuild(&mut self, zones: &[Zone], start_ms: f64, end_ms: f64, filter: Option<&StatFilter>) {
    self.entries.clear();
    self.sorted_mode = None;

    use std::collections::HashMap;
    let mut scope_index: HashMap<String, usize> = HashMap::new();
    let mut instance_index: HashMap<String, usize> = HashMap::new();

    for zone in zones {
      let mut iter = zone.store().begin_time_range(start_ms, end_ms, false);
      while !iter.done() {
        let flags = iter.type_flags();
        if flags.contains(EventTypeFlags::INTERNAL) || flags.contains(EventTypeFlags::BUILTIN) {
          iter.next();
          continue;
        }
        if let Some(f) = filter {
          if !f(&iter) {
            iter.next();
            continue;
          }
        }

        let name = iter.name().to_string();
        if iter.is_scope() {
          let idx = *scope_index.entry(name.clone()).or_insert_with(|| {
            self.entries.push(StatEntry::Scope(ScopeEntry::new(name.clone(), flags)));
            self.entries.len() - 1
          });
          if let StatEntry::Scope(entry) = &mut self.entries[idx] {
            let total_us = (iter.total_duration_ms() * 1000.0).round() as u64;
            let user_us = (iter.user_duration_ms() * 1000.0).round() as u64;
            entry.record(iter.user_duration_ms(), total_us, user_us);
          }
        } else {
          let idx = *instance_index.entry(name.clone()).or_insert_with(|| {
            self.entries.push(StatEntry::Instance(InstanceEntry { name: name.clone(), count: 0 }));
            self.entries.len() - 1
          });
          if let StatEntry::Instance(entry) = &mut self.entries[idx] {
            entry.count += 1;
          }
        }
        iter.next();
      }
    }
  }

  fn sort_for(&mut self, mode: SortMode) {
    if self.sorted_mode == Some(mode) {
      return;
    }
    match mode {
      SortMode::Count => {
        self.entries.sort_by(|a, b| b.count().cmp(&a.count()));
      }
      SortMode::TotalTime => {
        self.entries.sort_by(|a, b| class_then(a, b).then_with(|| match (a, b) {
          (StatEntry::Scope(x), StatEntry::Scope(y)) => y.total_time_us.cmp(&x.total_time_us),
          (StatEntry::Instance(x), StatEntry::Instance(y)) => y.count.cmp(&x.count),
          _ => std::cmp::Ordering::Equal,
        }));
      }
      SortMode::MeanTime => {
        self.entries.sort_by(|a, b| class_then(a, b).then_with(|| match (a, b) {
          (StatEntry::Scope(x), StatEntry::Scope(y)) => {
            y.mean_time_us().partial_cmp(&x.mean_time_us()).unwrap_or(std::cmp::Ordering::Equal)
          }
          (StatEntry::Instance(x), StatEntry::Instance(y)) => y.count.cmp(&x.count),
          _ => std::cmp::Ordering::Equal,
        }));
      }
    }
    self.sorted_mode = Some(mode);
  }

  /// Sorts (lazily, only re-sorting on a mode change) and visits every
  /// entry in `mode` order.
  pub fn for_each(&mut self, mode: SortMode, mut cb: impl FnMut(&StatEntry)) {
    self.sort_for(mode);
    for entry in &self.entries {
      cb(entry);
    }
  }
}

fn class_rank(entry: &StatEntry) -> u8 {
  match entry {
    StatEntry::Scope(_) => 0,
    StatEntry::Instance(_) => 1,
  }
}

fn class_then(a: &StatEntry, b: &StatEntry) -> std::cmp::Ordering {
  class_rank(a).cmp(&class_rank(b))
}
