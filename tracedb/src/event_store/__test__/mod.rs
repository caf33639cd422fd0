#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use crate::arguments::{ArgValue, ArgumentData};
  use crate::event_store::{self, EventStore, OFF_SYSTEM_TIME};
  use crate::event_type::{EventTypeDesc, EventTypeFlags, EventTypeTable};

  fn fresh_store() -> (Rc<RefCell<EventTypeTable>>, EventStore) {
    let types = Rc::new(RefCell::new(EventTypeTable::new()));
    event_store::register_builtin_types(&mut types.borrow_mut());
    let store = EventStore::new(types.clone());
    (types, store)
  }

  fn enter_id(types: &Rc<RefCell<EventTypeTable>>) -> u32 {
    types.borrow().by_name("wtf.scope#enter").unwrap().id
  }
  fn leave_id(types: &Rc<RefCell<EventTypeTable>>) -> u32 {
    types.borrow().by_name("wtf.scope#leave").unwrap().id
  }

  fn name_args(name: &str) -> ArgumentData {
    ArgumentData::from_pairs([("name", ArgValue::from(name))])
  }

  #[test]
  fn nested_scope_timing_s1() {
    let (types, mut store) = fresh_store();
    let enter = enter_id(&types);
    let leave = leave_id(&types);

    store.insert(enter, 0, Some(name_args("A")));
    store.insert(enter, 100, Some(name_args("B")));
    store.insert(leave, 400, None);
    store.insert(leave, 500, None);
    store.rebuild();

    let a = store.get_event(0).unwrap();
    assert_eq!(a.name().as_ref(), "A");
    assert_eq!(a.time_ms(), 0.0);
    assert_eq!(a.end_time_ms(), 0.5);
    assert_eq!(a.depth(), 0);
    assert_eq!(a.own_duration_ms(), 0.2);
    assert_eq!(store.cell_for_test(0, OFF_SYSTEM_TIME), 0);

    let b = store.get_event(1).unwrap();
    assert_eq!(b.name().as_ref(), "B");
    assert_eq!(b.time_ms(), 0.1);
    assert_eq!(b.end_time_ms(), 0.4);
    assert_eq!(b.depth(), 1);
    assert_eq!(b.parent(false).unwrap().id(), a.id());
  }

  #[test]
  fn out_of_order_insertion_matches_in_order_s2() {
    let (types, mut in_order) = fresh_store();
    let enter = enter_id(&types);
    let leave = leave_id(&types);
    in_order.insert(enter, 0, Some(name_args("A")));
    in_order.insert(enter, 100, Some(name_args("B")));
    in_order.insert(leave, 400, None);
    in_order.insert(leave, 500, None);
    in_order.rebuild();

    let (types2, mut scrambled) = fresh_store();
    let enter2 = enter_id(&types2);
    let leave2 = leave_id(&types2);
    scrambled.insert(leave2, 400, None);
    scrambled.insert(leave2, 500, None);
    scrambled.insert(enter2, 100, Some(name_args("B")));
    scrambled.insert(enter2, 0, Some(name_args("A")));
    scrambled.rebuild();

    for row in 0..4u32 {
      let a = in_order.get_event(row).unwrap();
      let b = scrambled.get_event(row).unwrap();
      assert_eq!(a.time_ms(), b.time_ms());
      assert_eq!(a.end_time_ms(), b.end_time_ms());
      assert_eq!(a.depth(), b.depth());
      assert_eq!(a.name(), b.name());
    }
  }

  #[test]
  fn system_time_attribution_s3() {
    let (types, mut store) = fresh_store();
    let enter = enter_id(&types);
    let leave = leave_id(&types);
    types.borrow_mut().define(
      EventTypeDesc::scope("B").with_flags(EventTypeFlags::SYSTEM_TIME),
    );

    store.insert(enter, 0, Some(name_args("A")));
    store.insert(enter, 100, Some(name_args("B")));
    store.insert(leave, 300, None);
    store.insert(leave, 1000, None);
    store.rebuild();

    let a = store.get_event(0).unwrap();
    assert_eq!(a.total_duration_ms(), 1.0);
    assert_eq!(store.cell_for_test(0, OFF_SYSTEM_TIME), 200);
    assert_eq!(a.user_duration_ms(), 0.8);
  }

  #[test]
  fn sibling_chain_enumerates_direct_children_in_time_order() {
    let (types, mut store) = fresh_store();
    let enter = enter_id(&types);
    let leave = leave_id(&types);
    store.insert(enter, 0, Some(name_args("root")));
    store.insert(enter, 10, Some(name_args("c1")));
    store.insert(leave, 20, None);
    store.insert(enter, 30, Some(name_args("c2")));
    store.insert(leave, 40, None);
    store.insert(leave, 50, None);
    store.rebuild();

    let root = store.get_event(0).unwrap();
    let mut child = store.get_event(root.id() + 1).unwrap();
    let mut names = Vec::new();
    loop {
      names.push(child.name().to_string());
      if child.depth() != root.depth() + 1 {
        break;
      }
      let before = child.id();
      child.next_sibling();
      if child.done() || child.id() == before {
        break;
      }
    }
    assert_eq!(names, vec!["c1", "c2"]);
  }

  #[test]
  fn rebuild_is_idempotent_round_trip() {
    let (types, mut store) = fresh_store();
    let enter = enter_id(&types);
    let leave = leave_id(&types);
    store.insert(enter, 50, Some(name_args("A")));
    store.insert(enter, 100, Some(name_args("B")));
    store.insert(leave, 400, None);
    store.insert(leave, 500, None);
    store.rebuild();

    let before: Vec<u32> = (0..store.count() as u32)
      .flat_map(|row| (0..crate::event_store::STRUCT_SIZE).map(move |off| (row, off)))
      .map(|(row, off)| store.cell_for_test(row as usize, off))
      .collect();

    store.rebuild();

    let after: Vec<u32> = (0..store.count() as u32)
      .flat_map(|row| (0..crate::event_store::STRUCT_SIZE).map(move |off| (row, off)))
      .map(|(row, off)| store.cell_for_test(row as usize, off))
      .collect();

    assert_eq!(before, after);
  }

  #[test]
  fn sort_stability_assigns_id_equal_to_row() {
    let (types, mut store) = fresh_store();
    let leave = leave_id(&types);
    // Three unmatched leave events sharing a timestamp: insertion order
    // must be the tie-break.
    store.insert(leave, 5, None);
    store.insert(leave, 5, None);
    store.insert(leave, 5, None);
    store.rebuild();
    for row in 0..3u32 {
      assert_eq!(store.get_event(row).unwrap().id(), row);
    }
  }

  #[test]
  fn stray_leave_event_is_logged_and_swept_silently() {
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    struct MessageCapture(Arc<Mutex<Vec<String>>>);
    struct MessageVisitor<'a>(&'a mut String);
    impl<'a> Visit for MessageVisitor<'a> {
      fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
          *self.0 = format!("{value:?}");
        }
      }
    }
    impl<S: tracing::Subscriber> Layer<S> for MessageCapture {
      fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.0.lock().unwrap().push(message);
      }
    }

    let captured = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::Registry::default().with(MessageCapture(captured.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let (types, mut store) = fresh_store();
    let leave = leave_id(&types);
    store.insert(leave, 5, None);
    store.rebuild();

    assert_eq!(store.get_event(0).unwrap().is_instance(), true);
    let messages = captured.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("no open scope")));
  }
}
