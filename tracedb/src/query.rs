//! # Query Engine
//!
//! Parses one of three filter syntaxes chosen by the expression's first
//! character, compiles it to a predicate over event names, and scans the
//! database to produce a lazy [`QueryResult`].

mod __test__;

use std::time::Duration;

use regex::Regex;

use crate::event_store::EventIterator;
use crate::zone::Zone;

/// The compiled form of a query expression, kept around for display.
#[derive(Debug, Clone)]
pub enum CompiledQuery {
  Regex(String),
  Path(Vec<String>),
  Substring(String),
}

impl CompiledQuery {
  pub fn display(&self) -> String {
    match self {
      CompiledQuery::Regex(src) => format!("/{src}/"),
      CompiledQuery::Path(segments) => segments.join("/"),
      CompiledQuery::Substring(s) => s.clone(),
    }
  }
}

enum Predicate {
  Regex(Regex),
  /// "descendant-or-self" path match: the event name must equal the full
  /// path, or end with `/` + the path's final segment.
  Path { full: String, last_segment: String },
  Substring(String),
}

impl Predicate {
  fn matches(&self, name: &str) -> bool {
    match self {
      Predicate::Regex(re) => re.is_match(name),
      Predicate::Path { full, last_segment } => {
        name == full || name.ends_with(&format!("/{last_segment}"))
      }
      Predicate::Substring(needle) => name.contains(needle.as_str()),
    }
  }
}

pub struct Query {
  compiled: CompiledQuery,
  predicate: Predicate,
}

impl Query {
  /// Compiles `expr` per the engine's three syntaxes:
  /// - `/pattern/` compiles `pattern` as a regex.
  /// - anything containing `/` elsewhere is an XPath-like path query.
  /// - everything else is a case-sensitive substring match.
  pub fn compile(expr: &str) -> crate::Result<Self> {
    if expr.len() >= 2 && expr.starts_with('/') && expr.ends_with('/') {
      let inner = &expr[1..expr.len() - 1];
      let re = Regex::new(inner).map_err(|e| crate::CoreError::QueryCompile(e.to_string()))?;
      return Ok(Self { compiled: CompiledQuery::Regex(inner.to_string()), predicate: Predicate::Regex(re) });
    }
    if expr.contains('/') {
      let full = expr.trim_matches('/').to_string();
      let last_segment = full.rsplit('/').next().unwrap_or(&full).to_string();
      return Ok(Self {
        compiled: CompiledQuery::Path(full.split('/').map(str::to_string).collect()),
        predicate: Predicate::Path { full, last_segment },
      });
    }
    Ok(Self { compiled: CompiledQuery::Substring(expr.to_string()), predicate: Predicate::Substring(expr.to_string()) })
  }

  pub fn display(&self) -> String {
    self.compiled.display()
  }

  fn matches(&self, iter: &EventIterator) -> bool {
    self.predicate.matches(iter.name().as_ref())
  }
}

/// One matching event, identified by its owning zone and record id so the
/// caller can re-seek into the zone's store.
#[derive(Debug, Clone)]
pub struct QueryHit {
  pub zone_index: usize,
  pub event_id: u32,
}

/// The lazy result of a compiled query: matching event identifiers plus
/// the compile-time representation and how long the scan took.
pub struct QueryResult {
  pub compiled_display: String,
  pub hits: Vec<QueryHit>,
  pub elapsed: Duration,
}

impl QueryResult {
  /// Serializes one row per matching event: zone, time, type name,
  /// duration, and arguments rendered as JSON.
  pub fn dump_csv(&self, zones: &[Zone]) -> String {
    let mut out = String::from("zone,time_ms,type_name,duration_ms,arguments\n");
    for hit in &self.hits {
      let Some(zone) = zones.get(hit.zone_index) else { continue };
      let Some(iter) = zone.store().get_event(hit.event_id) else { continue };
      let args_json = iter.arguments().map(|a| a.to_json().to_string()).unwrap_or_default();
      out.push_str(&format!(
        "{},{},{},{},\"{}\"\n",
        csv_escape(&zone.name),
        iter.time_ms(),
        csv_escape(iter.name().as_ref()),
        iter.total_duration_ms(),
        args_json.replace('"', "\"\""),
      ));
    }
    out
  }
}

fn csv_escape(field: &str) -> String {
  if field.contains(',') || field.contains('"') {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

/// Compiles `expr` and scans every zone's full event range with it,
/// returning the matching events, the compiled representation, and how
/// long the scan took.
pub fn execute(expr: &str, zones: &[Zone]) -> crate::Result<QueryResult> {
  let query = Query::compile(expr)?;
  let start = std::time::Instant::now();
  let mut hits = Vec::new();
  for (zone_index, zone) in zones.iter().enumerate() {
    let mut iter = zone.store().begin();
    while !iter.done() {
      if query.matches(&iter) {
        hits.push(QueryHit { zone_index, event_id: iter.id() });
      }
      iter.next();
    }
  }
  Ok(QueryResult { compiled_display: query.display(), hits, elapsed: start.elapsed() })
}
