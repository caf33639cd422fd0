#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use crate::ancillary::{frame_list, mark_list, time_range_list, AncillaryIndex, FrameList, MarkList, TimeRangeList};
  use crate::arguments::{ArgValue, ArgumentData};
  use crate::event_store::EventStore;
  use crate::event_type::EventTypeTable;

  fn fresh() -> (Rc<RefCell<EventTypeTable>>, EventStore) {
    let types = Rc::new(RefCell::new(EventTypeTable::new()));
    crate::event_store::register_builtin_types(&mut types.borrow_mut());
    frame_list::register_builtin_types(&mut types.borrow_mut());
    mark_list::register_builtin_types(&mut types.borrow_mut());
    time_range_list::register_builtin_types(&mut types.borrow_mut());
    let store = EventStore::new(types.clone());
    (types, store)
  }

  fn args(pairs: impl IntoIterator<Item = (&'static str, ArgValue)>) -> ArgumentData {
    ArgumentData::from_pairs(pairs)
  }

  #[test]
  fn frame_list_discards_incomplete_trailing_frame_s4() {
    let (types, mut store) = fresh();
    let frame_list = Rc::new(RefCell::new(FrameList::new()));
    store.register_ancillary(&(frame_list.clone() as Rc<RefCell<dyn AncillaryIndex>>));

    let start = types.borrow().by_name("wtf.timing#frameStart").unwrap().id;
    let end = types.borrow().by_name("wtf.timing#frameEnd").unwrap().id;

    store.insert(start, 1000, Some(args([("number", ArgValue::from(1i64))])));
    store.insert(end, 17000, Some(args([("number", ArgValue::from(1i64))])));
    store.insert(start, 17000, Some(args([("number", ArgValue::from(2i64))])));
    store.rebuild();

    let frames = frame_list.borrow();
    assert_eq!(frames.count(), 1);
    let found = frames.frame_at_time(10.0);
    assert_eq!(found.map(|f| f.number), Some(1));
  }

  #[test]
  fn mark_list_pairs_begin_end_by_id() {
    let (types, mut store) = fresh();
    let marks = Rc::new(RefCell::new(MarkList::new()));
    store.register_ancillary(&(marks.clone() as Rc<RefCell<dyn AncillaryIndex>>));

    let begin = types.borrow().by_name("wtf.mark#begin").unwrap().id;
    let end = types.borrow().by_name("wtf.mark#end").unwrap().id;

    store.insert(begin, 10, Some(args([("id", ArgValue::from(1i64)), ("name", ArgValue::from("load"))])));
    store.insert(end, 50, Some(args([("id", ArgValue::from(1i64))])));
    store.rebuild();

    let marks = marks.borrow();
    assert_eq!(marks.count(), 1);
    assert_eq!(marks.marks()[0].name, "load");
    assert_eq!(marks.marks()[0].start_time_ms, 0.01);
    assert_eq!(marks.marks()[0].end_time_ms, 0.05);
  }

  #[test]
  fn time_range_list_permits_overlapping_ranges() {
    let (types, mut store) = fresh();
    let ranges = Rc::new(RefCell::new(TimeRangeList::new()));
    store.register_ancillary(&(ranges.clone() as Rc<RefCell<dyn AncillaryIndex>>));

    let begin = types.borrow().by_name("wtf.timeRange#begin").unwrap().id;
    let end = types.borrow().by_name("wtf.timeRange#end").unwrap().id;

    store.insert(begin, 0, Some(args([("id", ArgValue::from(1i64)), ("name", ArgValue::from("gc"))])));
    store.insert(begin, 5, Some(args([("id", ArgValue::from(2i64)), ("name", ArgValue::from("gc"))])));
    store.insert(end, 20, Some(args([("id", ArgValue::from(1i64))])));
    store.insert(end, 25, Some(args([("id", ArgValue::from(2i64))])));
    store.rebuild();

    let ranges = ranges.borrow();
    assert_eq!(ranges.count(), 2);
  }

  #[test]
  fn late_registration_triggers_immediate_single_index_rebuild() {
    let (types, mut store) = fresh();
    let start = types.borrow().by_name("wtf.timing#frameStart").unwrap().id;
    let end = types.borrow().by_name("wtf.timing#frameEnd").unwrap().id;
    store.insert(start, 0, Some(args([("number", ArgValue::from(1i64))])));
    store.insert(end, 16, Some(args([("number", ArgValue::from(1i64))])));
    store.rebuild();

    let frame_list = Rc::new(RefCell::new(FrameList::new()));
    assert_eq!(frame_list.borrow().count(), 0);
    store.register_ancillary(&(frame_list.clone() as Rc<RefCell<dyn AncillaryIndex>>));
    assert_eq!(frame_list.borrow().count(), 1);
  }
}
