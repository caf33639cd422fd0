//! # Event Type Table
//!
//! Interns event-type definitions and assigns each a small, stable integer
//! id. Ids are handed out monotonically starting at 1; id 0 is a reserved
//! sentinel and never names a real type.
//!
//! Definitions are immutable once interned: re-defining a name that already
//! exists returns the existing entry unchanged, even if the newly supplied
//! descriptor (class, flags, argument signature) differs. Diffing
//! redefinitions is a known gap in the system this is modeled on and is
//! deliberately left unimplemented here, see `DESIGN.md`.

mod __test__;

use std::collections::HashMap;
use std::sync::Arc;

/// Whether an event type demarcates a timed interval or a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
  /// Paired enter/leave event; has a duration.
  Scope,
  /// Point-in-time event; has no duration.
  Instance,
}

/// Bitmask of behavioral flags carried by an [`EventType`].
///
/// Packed into a `u32` rather than modeled as a `Vec<Flag>`: flags are
/// checked on every event during statistics and scope aggregation, so a
/// single bitwise AND is worth the loss of a named-variant API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTypeFlags(pub u32);

impl EventTypeFlags {
  pub const NONE: EventTypeFlags = EventTypeFlags(0);
  /// Excluded from statistics aggregation.
  pub const INTERNAL: EventTypeFlags = EventTypeFlags(1 << 0);
  /// Pre-declared by the core rather than defined on demand by a trace.
  pub const BUILTIN: EventTypeFlags = EventTypeFlags(1 << 1);
  /// Time spent in this scope (and its subtree) counts as system time,
  /// subtracted from the enclosing scope's user-visible duration.
  pub const SYSTEM_TIME: EventTypeFlags = EventTypeFlags(1 << 2);

  pub const fn contains(self, other: EventTypeFlags) -> bool {
    (self.0 & other.0) == other.0
  }

  pub const fn union(self, other: EventTypeFlags) -> EventTypeFlags {
    EventTypeFlags(self.0 | other.0)
  }
}

impl std::ops::BitOr for EventTypeFlags {
  type Output = EventTypeFlags;
  fn bitor(self, rhs: EventTypeFlags) -> EventTypeFlags {
    self.union(rhs)
  }
}

/// The kind of value an argument slot is expected to carry. Stored on the
/// type descriptor for documentation and future validation; the rebuilder
/// does not currently enforce it (see the Open Question in `DESIGN.md`
/// about redefinition diffing; signature checking is the same unfinished
/// corner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
  Int,
  Double,
  String,
  Bytes,
  List,
  Map,
}

/// One named slot in an event type's argument signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
  pub name: String,
  pub kind: ArgKind,
}

/// An immutable, interned event-type definition.
///
/// Cheaply clonable: the name and signature live behind an `Arc` so that
/// iterators and ancillary indexes can hold a type handle without cloning
/// strings on every access.
#[derive(Debug, Clone, PartialEq)]
pub struct EventType {
  pub id: u32,
  pub name: Arc<str>,
  pub class: EventClass,
  pub flags: EventTypeFlags,
  pub signature: Arc<[ArgSpec]>,
}

impl EventType {
  pub fn is_scope(&self) -> bool {
    matches!(self.class, EventClass::Scope)
  }
}

/// A type descriptor as supplied to [`EventTypeTable::define`], before an id
/// has been assigned.
#[derive(Debug, Clone)]
pub struct EventTypeDesc {
  pub name: String,
  pub class: EventClass,
  pub flags: EventTypeFlags,
  pub signature: Vec<ArgSpec>,
}

impl EventTypeDesc {
  pub fn scope(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      class: EventClass::Scope,
      flags: EventTypeFlags::NONE,
      signature: Vec::new(),
    }
  }

  pub fn instance(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      class: EventClass::Instance,
      flags: EventTypeFlags::NONE,
      signature: Vec::new(),
    }
  }

  pub fn with_flags(mut self, flags: EventTypeFlags) -> Self {
    self.flags = flags;
    self
  }
}

/// Interning table for event types, owned by a [`crate::database::Database`]
/// and shared (by reference) with every zone's event store.
///
/// Lifetime of an entry is the database's lifetime: there is no eviction.
#[derive(Debug, Default)]
pub struct EventTypeTable {
  by_name: HashMap<String, u32>,
  by_id: Vec<EventType>, // index 0 unused, ids start at 1
}

impl EventTypeTable {
  pub fn new() -> Self {
    Self {
      by_name: HashMap::new(),
      by_id: vec![EventType {
        id: 0,
        name: Arc::from(""),
        class: EventClass::Instance,
        flags: EventTypeFlags::NONE,
        signature: Arc::from(Vec::new()),
      }],
    }
  }

  /// Intern `desc` by name, returning the existing entry unchanged if the
  /// name was already defined.
  pub fn define(&mut self, desc: EventTypeDesc) -> EventType {
    if let Some(&id) = self.by_name.get(&desc.name) {
      return self.by_id[id as usize].clone();
    }
    let id = self.by_id.len() as u32;
    let ty = EventType {
      id,
      name: Arc::from(desc.name.as_str()),
      class: desc.class,
      flags: desc.flags,
      signature: Arc::from(desc.signature),
    };
    self.by_name.insert(desc.name, id);
    self.by_id.push(ty.clone());
    ty
  }

  pub fn by_id(&self, id: u32) -> Option<EventType> {
    if id == 0 {
      return None;
    }
    self.by_id.get(id as usize).cloned()
  }

  pub fn by_name(&self, name: &str) -> Option<EventType> {
    self.by_name.get(name).map(|&id| self.by_id[id as usize].clone())
  }

  pub fn len(&self) -> usize {
    self.by_id.len() - 1
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
