#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use crate::arguments::{ArgValue, ArgumentData};
  use crate::database::{Database, DataSourceSink, SourceContext, WorkerCommand, WorkerEvent};
  use crate::zone::ZoneType;

  fn scope_args(name: &str) -> ArgumentData {
    ArgumentData::from_pairs([("name", ArgValue::from(name))])
  }

  #[test]
  fn commit_batch_rebuilds_and_notifies_listeners() {
    let mut db = Database::new();
    let zone = db.create_zone("main", ZoneType::Thread, "");
    let source = db.register_source();
    db.initialize(source, SourceContext::default()).unwrap();

    let enter = db.type_table().borrow().by_name("wtf.scope#enter").unwrap().id;
    let leave = db.type_table().borrow().by_name("wtf.scope#leave").unwrap().id;

    db.begin_batch(zone).unwrap();
    db.add_event(source, zone, enter, 0, Some(scope_args("A"))).unwrap();
    db.add_event(source, zone, leave, 100, None).unwrap();

    struct Recorder(Rc<RefCell<Vec<Vec<String>>>>);
    impl crate::database::DatabaseListener for Recorder {
      fn on_invalidated(&self, zone_names: &[String]) {
        self.0.borrow_mut().push(zone_names.to_vec());
      }
    }
    let seen = Rc::new(RefCell::new(Vec::new()));
    db.add_listener(Rc::new(Recorder(seen.clone())));

    db.commit_batch(zone).unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0], vec!["main".to_string()]);
    assert_eq!(db.zone(zone).unwrap().store().count(), 2);
  }

  #[test]
  fn discard_batch_rolls_back_to_last_commit() {
    let mut db = Database::new();
    let zone = db.create_zone("main", ZoneType::Thread, "");
    let source = db.register_source();
    let enter = db.type_table().borrow().by_name("wtf.scope#enter").unwrap().id;
    let leave = db.type_table().borrow().by_name("wtf.scope#leave").unwrap().id;

    db.begin_batch(zone).unwrap();
    db.add_event(source, zone, enter, 0, Some(scope_args("A"))).unwrap();
    db.add_event(source, zone, leave, 10, None).unwrap();
    db.commit_batch(zone).unwrap();
    assert_eq!(db.zone(zone).unwrap().store().count(), 2);

    db.begin_batch(zone).unwrap();
    db.add_event(source, zone, enter, 20, Some(scope_args("B"))).unwrap();
    db.discard_batch(zone).unwrap();

    assert_eq!(db.zone(zone).unwrap().store().count(), 2);
  }

  #[test]
  fn unknown_zone_reports_error() {
    let mut db = Database::new();
    let source = db.register_source();
    let bogus = crate::database::ZoneRef(42);
    let err = db.add_event(source, bogus, 1, 0, None).unwrap_err();
    assert!(matches!(err, crate::CoreError::UnknownZone(_)));
  }

  #[test]
  fn snapshot_produces_one_wtf_trace_buffer() {
    let mut db = Database::new();
    let zone = db.create_zone("main", ZoneType::Thread, "");
    let source = db.register_source();
    let enter = db.type_table().borrow().by_name("wtf.scope#enter").unwrap().id;
    let leave = db.type_table().borrow().by_name("wtf.scope#leave").unwrap().id;
    db.add_event(source, zone, enter, 0, Some(scope_args("A"))).unwrap();
    db.add_event(source, zone, leave, 50, None).unwrap();
    db.commit_batch(zone).unwrap();

    let buffers = db.snapshot_data_stream_buffers().unwrap();
    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0].mime_type, crate::database::WTF_TRACE_MIME);
    assert!(!buffers[0].bytes.is_empty());
  }

  #[test]
  fn snapshot_buffer_round_trips_through_a_wtf_trace_file() {
    use std::fs::File;
    use std::io::{Read, Write};

    let mut db = Database::new();
    let zone = db.create_zone("main", ZoneType::Thread, "");
    let source = db.register_source();
    let enter = db.type_table().borrow().by_name("wtf.scope#enter").unwrap().id;
    db.add_event(source, zone, enter, 0, Some(scope_args("A"))).unwrap();
    db.commit_batch(zone).unwrap();

    let buffer = db.snapshot_data_stream_buffers().unwrap().pop().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.wtf-trace");
    File::create(&path).unwrap().write_all(&buffer.bytes).unwrap();

    let mut read_back = Vec::new();
    File::open(&path).unwrap().read_to_end(&mut read_back).unwrap();
    assert_eq!(read_back, buffer.bytes);
  }

  #[test]
  fn worker_thread_ingests_and_reports_invalidation() {
    let handle = crate::database::spawn_worker(|| {
      let mut db = Database::new();
      db.create_zone("main", ZoneType::Thread, "");
      db.register_source();
      db
    });
    let zone = crate::database::ZoneRef(0);
    let source = crate::database::SourceId(0);

    handle.send(WorkerCommand::Initialize { source, context: SourceContext::default() });
    handle.send(WorkerCommand::BeginBatch { zone });
    handle.send(WorkerCommand::AddEvent {
      source,
      zone,
      type_id: 1, // wtf.scope#enter is always id 1 on a fresh table
      time_us: 0,
      args: Some(scope_args("A")),
    });
    handle.send(WorkerCommand::AddEvent { source, zone, type_id: 2, time_us: 10, args: None });
    handle.send(WorkerCommand::CommitBatch { zone });

    match handle.recv() {
      Some(WorkerEvent::Invalidated { zone_names }) => assert_eq!(zone_names, vec!["main".to_string()]),
      Some(WorkerEvent::Failed { message }) => panic!("worker reported a failure: {message}"),
      None => panic!("worker channel closed before sending a notification"),
    }
  }
}
