//! # Database
//!
//! Owns every [`Zone`], the shared [`EventTypeTable`], and the bookkeeping
//! for registered data sources. A data source decodes some wire format
//! externally (out of scope for this crate, see §6) and calls back into
//! [`DataSourceSink::add_event`] as it parses; at a batch boundary the
//! ingestion adapter calls [`Database::commit_batch`], which sorts,
//! re-scopes, rebuilds every ancillary index, and fires `INVALIDATED` to
//! registered listeners. A mid-batch parse failure calls
//! [`Database::discard_batch`] instead, leaving the zone at its last
//! commit.

mod snapshot;
mod worker;
mod __test__;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::arguments::ArgumentData;
use crate::error::{CoreError, Result};
use crate::event_type::EventTypeTable;
use crate::zone::{Zone, ZoneListener, ZoneType};

pub use snapshot::{SnapshotBuffer, WTF_TRACE_MIME};
pub use worker::{spawn_worker, WorkerCommand, WorkerEvent, WorkerHandle};

/// Bitmask of flags a data source declares at [`DataSourceSink::initialize`].
/// The core only ever inspects `HAS_HIGH_RESOLUTION_TIMES`; every other bit
/// is opaque metadata for the ingestion adapter's own use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceFlags(pub u32);

impl SourceFlags {
  pub const NONE: SourceFlags = SourceFlags(0);
  pub const HAS_HIGH_RESOLUTION_TIMES: SourceFlags = SourceFlags(1 << 0);

  pub const fn contains(self, other: SourceFlags) -> bool {
    (self.0 & other.0) == other.0
  }
}

/// Header information a data source supplies once, before its first event.
/// `timebase_secs` is the wall-clock time the trace's t=0 corresponds to;
/// `time_delay_secs` is the adapter's estimate of clock skew between the
/// recording source and local wall-clock time. The core stores these for
/// display purposes only; it performs no timebase alignment itself.
#[derive(Debug, Clone)]
pub struct SourceContext {
  pub context_info: String,
  pub flags: SourceFlags,
  pub metadata: serde_json::Value,
  pub timebase_secs: f64,
  pub time_delay_secs: f64,
}

impl Default for SourceContext {
  fn default() -> Self {
    Self {
      context_info: String::new(),
      flags: SourceFlags::NONE,
      metadata: serde_json::Value::Null,
      timebase_secs: 0.0,
      time_delay_secs: 0.0,
    }
  }
}

/// Stable handle to a zone owned by a [`Database`]. Indices are never
/// reused within a database's lifetime since zones are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneRef(pub(crate) usize);

/// Opaque handle to a registered data source, returned by
/// [`Database::register_source`]. Exists so multiple sources can feed the
/// same database (and even the same zone) without their batch boundaries
/// interfering with one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) u32);

#[derive(Debug, Default)]
struct SourceState {
  context: Option<SourceContext>,
}

/// Implemented by the database to serve as the receiving end of the
/// ingestion interface (§6). A parsing adapter outside this crate calls
/// `initialize` once per source, then `add_event` per decoded record.
pub trait DataSourceSink {
  fn initialize(&mut self, source: SourceId, context: SourceContext) -> Result<()>;

  fn add_event(
    &mut self,
    source: SourceId,
    zone: ZoneRef,
    type_id: u32,
    time_us: u64,
    args: Option<ArgumentData>,
  ) -> Result<()>;
}

/// Invoked after every successful [`Database::commit_batch`] (or
/// [`Database::commit_all`]) with the names of every zone that was
/// rebuilt, aggregating each zone's own `INVALIDATED` into one
/// database-level notification (§6).
pub trait DatabaseListener {
  fn on_invalidated(&self, zone_names: &[String]);
}

/// Owns every zone, the event-type table shared across them, and
/// orchestrates ingestion. Single logical actor per §5: ingest, rebuild,
/// read, never interleaved.
pub struct Database {
  type_table: Rc<RefCell<EventTypeTable>>,
  zones: Vec<Zone>,
  zone_index_by_name: HashMap<String, usize>,
  sources: HashMap<u32, SourceState>,
  next_source_id: u32,
  listeners: Vec<Rc<dyn DatabaseListener>>,
}

impl Database {
  pub fn new() -> Self {
    Self {
      type_table: Rc::new(RefCell::new(EventTypeTable::new())),
      zones: Vec::new(),
      zone_index_by_name: HashMap::new(),
      sources: HashMap::new(),
      next_source_id: 0,
      listeners: Vec::new(),
    }
  }

  pub fn type_table(&self) -> Rc<RefCell<EventTypeTable>> {
    self.type_table.clone()
  }

  pub fn zones(&self) -> &[Zone] {
    &self.zones
  }

  pub fn zone(&self, zone: ZoneRef) -> Option<&Zone> {
    self.zones.get(zone.0)
  }

  pub fn zone_mut(&mut self, zone: ZoneRef) -> Option<&mut Zone> {
    self.zones.get_mut(zone.0)
  }

  pub fn zone_by_name(&self, name: &str) -> Option<ZoneRef> {
    self.zone_index_by_name.get(name).map(|&i| ZoneRef(i))
  }

  /// Creates a new zone with its own event store and the three builtin
  /// ancillary indexes (frames, marks, time ranges), sharing this
  /// database's event-type table. Distinct zones never share storage.
  pub fn create_zone(
    &mut self,
    name: impl Into<String>,
    zone_type: ZoneType,
    location: impl Into<String>,
  ) -> ZoneRef {
    let name = name.into();
    let zone = Zone::new(name.clone(), zone_type, location, self.type_table.clone());
    let index = self.zones.len();
    self.zones.push(zone);
    self.zone_index_by_name.insert(name, index);
    ZoneRef(index)
  }

  pub fn register_source(&mut self) -> SourceId {
    let id = self.next_source_id;
    self.next_source_id += 1;
    self.sources.insert(id, SourceState::default());
    SourceId(id)
  }

  pub fn add_listener(&mut self, listener: Rc<dyn DatabaseListener>) {
    self.listeners.push(listener);
  }

  /// Registers a caller-supplied listener directly on one zone (rather
  /// than the database-aggregate notification `add_listener` gives you).
  pub fn add_zone_listener(&mut self, zone: ZoneRef, listener: Rc<dyn ZoneListener>) {
    if let Some(z) = self.zones.get_mut(zone.0) {
      z.add_listener(listener);
    }
  }

  fn zone_or_err(&mut self, zone: ZoneRef) -> Result<&mut Zone> {
    self.zones
      .get_mut(zone.0)
      .ok_or_else(|| CoreError::UnknownZone(format!("zone index {}", zone.0)))
  }

  /// Marks the start of a new ingestion batch for `zone`, so a later
  /// `discard_batch` knows how far to roll back on a parse failure.
  pub fn begin_batch(&mut self, zone: ZoneRef) -> Result<()> {
    self.zone_or_err(zone)?.begin_batch();
    Ok(())
  }

  /// Drops every record inserted into `zone` since its last
  /// `begin_batch`/`commit_batch`. Called by the ingestion adapter when
  /// the wire-format parse fails mid-batch (§7); the zone's readable
  /// state is unaffected.
  pub fn discard_batch(&mut self, zone: ZoneRef) -> Result<()> {
    self.zone_or_err(zone)?.discard_batch();
    Ok(())
  }

  /// Sorts, re-scopes, and rebuilds every ancillary index for `zone`,
  /// then fires both the zone's own listeners and this database's
  /// aggregate listeners.
  pub fn commit_batch(&mut self, zone: ZoneRef) -> Result<()> {
    let z = self.zone_or_err(zone)?;
    z.commit_batch();
    let name = z.name.clone();
    tracing::debug!(zone = %name, events = z.store().count(), "rebuilt zone");
    self.notify_invalidated(vec![name]);
    Ok(())
  }

  /// Commits every zone in the database, regardless of which ones
  /// actually received new events since the last commit. Convenient for
  /// a single-source caller that doesn't track per-zone batch
  /// boundaries; `rebuild` on an empty batch is a cheap no-op pass.
  pub fn commit_all(&mut self) {
    let mut names = Vec::with_capacity(self.zones.len());
    for zone in &mut self.zones {
      zone.commit_batch();
      names.push(zone.name.clone());
    }
    self.notify_invalidated(names);
  }

  fn notify_invalidated(&self, zone_names: Vec<String>) {
    for listener in &self.listeners {
      listener.on_invalidated(&zone_names);
    }
  }

  /// §6 storage-snapshot interface: serializes every zone's committed
  /// events to CBOR and LZ4-compresses the result. Returns one buffer
  /// tagged with the binary WTF-trace MIME type; callers append the
  /// `.wtf-trace` extension.
  pub fn snapshot_data_stream_buffers(&self) -> Result<Vec<SnapshotBuffer>> {
    snapshot::build(&self.zones)
  }
}

impl Default for Database {
  fn default() -> Self {
    Self::new()
  }
}

impl DataSourceSink for Database {
  fn initialize(&mut self, source: SourceId, context: SourceContext) -> Result<()> {
    let state = self
      .sources
      .get_mut(&source.0)
      .ok_or_else(|| CoreError::UnknownZone(format!("unregistered source {}", source.0)))?;
    state.context = Some(context);
    Ok(())
  }

  /// Appends a decoded event into `zone`'s store. Fails only if the
  /// zone is unknown or the store could not grow to accommodate the new
  /// record; a growth failure is fatal to the zone (§7 resource
  /// exhaustion); the zone is marked invalid, `INVALIDATED` fires
  /// immediately so consumers stop relying on further updates, and
  /// existing data remains readable.
  fn add_event(
    &mut self,
    _source: SourceId,
    zone: ZoneRef,
    type_id: u32,
    time_us: u64,
    args: Option<ArgumentData>,
  ) -> Result<()> {
    let z = self.zone_or_err(zone)?;
    match z.store_mut().insert(type_id, time_us, args) {
      Ok(_) => Ok(()),
      Err(message) => {
        let name = z.name.clone();
        z.mark_invalid();
        tracing::warn!(zone = %name, %message, "event store exhausted; zone marked invalid");
        self.notify_invalidated(vec![name.clone()]);
        Err(CoreError::StoreExhausted { zone: name, message })
      }
    }
  }
}
