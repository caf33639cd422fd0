use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use tracedb::arguments::{ArgValue, ArgumentData};
use tracedb::database::{DataSourceSink, Database, SourceContext};
use tracedb::event_store::{self, EventStore};
use tracedb::event_type::EventTypeTable;
use tracedb::query;
use tracedb::zone::ZoneType;

fn configure_criterion() -> Criterion {
  Criterion::default()
    .sample_size(30)
    .measurement_time(Duration::from_secs(5))
    .warm_up_time(Duration::from_secs(2))
}

fn name_args(name: &str) -> ArgumentData {
  ArgumentData::from_pairs([("name", ArgValue::from(name))])
}

/// Pushes `scopes` sibling scopes of depth 2 each, mimicking a flat trace
/// of short-lived work items. This is the shape §9 calls out as the
/// design's whole reason to exist: a flat integer column buffer with no
/// per-event allocation, scaling to million-event traces.
fn fill_store(store: &mut EventStore, types: &Rc<RefCell<EventTypeTable>>, scopes: u64) {
  let enter = types.borrow().by_name("wtf.scope#enter").unwrap().id;
  let leave = types.borrow().by_name("wtf.scope#leave").unwrap().id;
  let mut t = 0u64;
  for i in 0..scopes {
    store.insert(enter, t, Some(name_args("outer"))).unwrap();
    t += 1;
    store.insert(enter, t, Some(name_args(if i % 2 == 0 { "even" } else { "odd" }))).unwrap();
    t += 1;
    store.insert(leave, t, None).unwrap();
    t += 1;
    store.insert(leave, t, None).unwrap();
    t += 1;
  }
}

fn bench_ingest_and_rebuild(c: &mut Criterion) {
  let mut group = c.benchmark_group("ingest_and_rebuild");
  for &scopes in &[1_000u64, 10_000, 100_000] {
    group.bench_with_input(BenchmarkId::from_parameter(scopes), &scopes, |b, &scopes| {
      b.iter(|| {
        let types = Rc::new(RefCell::new(EventTypeTable::new()));
        event_store::register_builtin_types(&mut types.borrow_mut());
        let mut store = EventStore::new(types.clone());
        fill_store(&mut store, &types, scopes);
        store.rebuild();
        criterion::black_box(store.count());
      });
    });
  }
  group.finish();
}

fn bench_rebuild_only(c: &mut Criterion) {
  let mut group = c.benchmark_group("rebuild_only");
  for &scopes in &[1_000u64, 10_000, 100_000] {
    group.bench_with_input(BenchmarkId::from_parameter(scopes), &scopes, |b, &scopes| {
      let types = Rc::new(RefCell::new(EventTypeTable::new()));
      event_store::register_builtin_types(&mut types.borrow_mut());
      let mut store = EventStore::new(types.clone());
      fill_store(&mut store, &types, scopes);
      b.iter(|| {
        store.rebuild();
        criterion::black_box(store.max_depth());
      });
    });
  }
  group.finish();
}

fn bench_query_scan(c: &mut Criterion) {
  let mut db = Database::new();
  let zone = db.create_zone("bench", ZoneType::Thread, "");
  let source = db.register_source();
  db.initialize(source, SourceContext::default()).unwrap();
  db.begin_batch(zone).unwrap();
  {
    let types = db.type_table();
    let enter = types.borrow().by_name("wtf.scope#enter").unwrap().id;
    let leave = types.borrow().by_name("wtf.scope#leave").unwrap().id;
    let mut t = 0u64;
    for i in 0..50_000u64 {
      db.add_event(source, zone, enter, t, Some(name_args(if i % 7 == 0 { "hot/path" } else { "cold" }))).unwrap();
      t += 1;
      db.add_event(source, zone, leave, t, None).unwrap();
      t += 1;
    }
  }
  db.commit_batch(zone).unwrap();

  c.bench_function("query_substring_scan_50k", |b| {
    b.iter(|| {
      let result = query::execute("hot/path", db.zones()).unwrap();
      criterion::black_box(result.hits.len());
    });
  });
}

criterion_group! {
  name = benches;
  config = configure_criterion();
  targets = bench_ingest_and_rebuild, bench_rebuild_only, bench_query_scan
}
criterion_main!(benches);
