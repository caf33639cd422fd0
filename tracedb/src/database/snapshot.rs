//! §6 storage-snapshot interface. Serializes every zone's committed
//! records to CBOR, then LZ4-compresses the buffer, the same two-step
//! encode-then-compress pipeline the trace recorder itself uses for its
//! on-disk snapshots.

use chrono::Utc;
use lz4::block::{compress, CompressionMode};
use serde::Serialize;

use crate::error::{Result, SnapshotError};
use crate::zone::{Zone, ZoneType};

/// MIME type for a binary WTF recording (§6). Callers append the
/// `.wtf-trace` file extension.
pub const WTF_TRACE_MIME: &str = "application/x-extension-wtf-trace";

/// One serialized, compressed stream buffer, ready for a caller to write
/// to disk or hand to a file picker.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct SnapshotEnvelope {
  hostname: String,
  pid: u32,
  created_at: String,
  zones: Vec<SnapshotZone>,
}

#[derive(Serialize)]
struct SnapshotZone {
  name: String,
  zone_type: &'static str,
  location: String,
  events: Vec<SnapshotEvent>,
}

#[derive(Serialize)]
struct SnapshotEvent {
  id: u32,
  type_name: String,
  parent: Option<u32>,
  depth: u32,
  time_us: u64,
  end_time_us: u64,
  arguments: serde_json::Value,
}

fn zone_type_name(zone_type: ZoneType) -> &'static str {
  match zone_type {
    ZoneType::Thread => "thread",
    ZoneType::Isolate => "isolate",
    ZoneType::Process => "process",
    ZoneType::Other => "other",
  }
}

fn snapshot_zone(zone: &Zone) -> SnapshotZone {
  let mut events = Vec::with_capacity(zone.store().count());
  let mut iter = zone.store().begin();
  while !iter.done() {
    events.push(SnapshotEvent {
      id: iter.id(),
      type_name: iter.name().to_string(),
      parent: iter.parent(false).map(|p| p.id()),
      depth: iter.depth(),
      time_us: (iter.time_ms() * 1000.0).round() as u64,
      end_time_us: (iter.end_time_ms() * 1000.0).round() as u64,
      arguments: iter.arguments().map(|a| a.to_json()).unwrap_or(serde_json::Value::Null),
    });
    iter.next();
  }
  SnapshotZone {
    name: zone.name.clone(),
    zone_type: zone_type_name(zone.zone_type),
    location: zone.location.clone(),
    events,
  }
}

pub(super) fn build(zones: &[Zone]) -> Result<Vec<SnapshotBuffer>> {
  let envelope = SnapshotEnvelope {
    hostname: gethostname::gethostname().to_string_lossy().into_owned(),
    pid: std::process::id(),
    created_at: Utc::now().to_rfc3339(),
    zones: zones.iter().map(snapshot_zone).collect(),
  };
  let cbor = serde_cbor::to_vec(&envelope).map_err(SnapshotError::Encode)?;
  let compressed = compress(&cbor, Some(CompressionMode::DEFAULT), true).map_err(SnapshotError::Compress)?;
  Ok(vec![SnapshotBuffer { mime_type: WTF_TRACE_MIME.to_string(), bytes: compressed }])
}
