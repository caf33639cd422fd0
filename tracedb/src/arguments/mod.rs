//! # Argument Data
//!
//! Ordered, named bags of typed values attached to events. A single
//! [`ArgumentData`] is interned into its owning [`crate::event_store::EventStore`]
//! and addressed by a non-zero id; id 0 means "no arguments" and is never
//! allocated.


use indexmap::IndexMap;
use std::sync::Arc;

/// A typed value an argument can hold. Nested containers reuse the same
/// enum, so an argument bag can carry arbitrarily structured data (the wire
/// formats this is decoded from allow e.g. a stack trace as a list of
/// strings, or a resource as a map of maps).
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
  Int(i64),
  Double(f64),
  String(Arc<str>),
  Bytes(Arc<[u8]>),
  List(Vec<ArgValue>),
  Map(ArgumentData),
}

impl From<i64> for ArgValue {
  fn from(v: i64) -> Self {
    ArgValue::Int(v)
  }
}
impl From<f64> for ArgValue {
  fn from(v: f64) -> Self {
    ArgValue::Double(v)
  }
}
impl From<&str> for ArgValue {
  fn from(v: &str) -> Self {
    ArgValue::String(Arc::from(v))
  }
}
impl From<String> for ArgValue {
  fn from(v: String) -> Self {
    ArgValue::String(Arc::from(v.as_str()))
  }
}

/// An ordered mapping from argument name to [`ArgValue`].
///
/// Insertion order is preserved through [`ArgumentData::merge`]: a name that
/// already exists keeps its original position and simply has its value
/// overwritten, matching `wtf.scope#appendData`'s semantics of layering new
/// fields onto a scope without reshuffling the ones a painter already
/// rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentData(IndexMap<String, ArgValue>);

impl ArgumentData {
  pub fn new() -> Self {
    Self(IndexMap::new())
  }

  pub fn from_pairs<I, K>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, ArgValue)>,
    K: Into<String>,
  {
    Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }

  pub fn get(&self, key: &str) -> Option<&ArgValue> {
    self.0.get(key)
  }

  pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
    self.0.insert(key.into(), value);
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Merge `other`'s fields into `self`: identically named fields are
  /// overwritten with `other`'s value but keep `self`'s original
  /// position; new names are appended in `other`'s order.
  pub fn merge(&mut self, other: &ArgumentData) {
    for (k, v) in other.0.iter() {
      self.0.insert(k.clone(), v.clone());
    }
  }

  /// Render to a `serde_json::Value` for display and CSV/query dumps.
  pub fn to_json(&self) -> serde_json::Value {
    fn arg_to_json(v: &ArgValue) -> serde_json::Value {
      match v {
        ArgValue::Int(i) => serde_json::json!(i),
        ArgValue::Double(d) => serde_json::json!(d),
        ArgValue::String(s) => serde_json::json!(s.as_ref()),
        ArgValue::Bytes(b) => serde_json::json!(b.len()),
        ArgValue::List(items) => {
          serde_json::Value::Array(items.iter().map(arg_to_json).collect())
        }
        ArgValue::Map(map) => map.to_json(),
      }
    }
    let mut obj = serde_json::Map::with_capacity(self.0.len());
    for (k, v) in self.0.iter() {
      obj.insert(k.clone(), arg_to_json(v));
    }
    serde_json::Value::Object(obj)
  }
}

/// Per-store interning table for [`ArgumentData`]. Ids start at 1; 0 is the
/// "no arguments" sentinel and is never issued.
#[derive(Debug, Default)]
pub struct ArgumentTable {
  entries: Vec<ArgumentData>, // index 0 unused
}

impl ArgumentTable {
  pub fn new() -> Self {
    Self { entries: vec![ArgumentData::new()] }
  }

  /// Intern `data`, returning a fresh non-zero id. Unlike event types,
  /// argument bags are not deduplicated by content: each call to
  /// `insert` on the event store that carries arguments gets its own
  /// entry, since `appendScopeData` must be able to mutate one entry in
  /// place without disturbing unrelated events that happen to share
  /// identical argument values.
  pub fn intern(&mut self, data: ArgumentData) -> u32 {
    let id = self.entries.len() as u32;
    self.entries.push(data);
    id
  }

  pub fn get(&self, id: u32) -> Option<&ArgumentData> {
    if id == 0 {
      return None;
    }
    self.entries.get(id as usize)
  }

  pub fn get_mut(&mut self, id: u32) -> Option<&mut ArgumentData> {
    if id == 0 {
      return None;
    }
    self.entries.get_mut(id as usize)
  }
}
