//! Error taxonomy for the core. Each operation reports locally; there is no
//! global error state. Most inconsistencies the source format can produce
//! (stray leave events, appendData with no open scope) are swept silently
//! during rebuild rather than surfaced here, see `event_store::scope`.

use thiserror::Error;

/// Errors the core can report back to a caller.
///
/// Non-fatal inconsistencies swept during rebuild are *not* represented
/// here; this enum only covers conditions a caller needs to react to.
#[derive(Debug, Error)]
pub enum CoreError {
  /// A data source failed to parse its wire format mid-batch. The partial
  /// batch is discarded and the zone is left at its last commit.
  #[error("source parse failure in zone {zone}: {message}")]
  SourceParseFailure { zone: String, message: String },

  /// The event store could not grow to accommodate new records. Fatal to
  /// the owning zone; existing data remains readable.
  #[error("event store for zone {zone} exhausted its storage: {message}")]
  StoreExhausted { zone: String, message: String },

  /// A query expression failed to compile. No state mutation occurs.
  #[error("query compile failure: {0}")]
  QueryCompile(String),

  /// The named zone does not exist on this database.
  #[error("no such zone: {0}")]
  UnknownZone(String),

  /// Failed to serialize or compress a storage snapshot.
  #[error("snapshot failure: {0}")]
  Snapshot(#[from] SnapshotError),
}

/// Narrower error type for the storage-snapshot interface, kept distinct
/// from [`CoreError`] because it wraps two independent fallible libraries.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("cbor encode failed: {0}")]
  Encode(#[from] serde_cbor::Error),
  #[error("lz4 compression failed: {0}")]
  Compress(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
