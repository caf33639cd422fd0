#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use crate::arguments::{ArgValue, ArgumentData};
  use crate::event_type::EventTypeTable;
  use crate::query;
  use crate::zone::{Zone, ZoneType};

  fn zone_with_names(names: &[&str]) -> Zone {
    let types = Rc::new(RefCell::new(EventTypeTable::new()));
    let mut zone = Zone::new("z", ZoneType::Thread, "", types.clone());
    let enter = types.borrow().by_name("wtf.scope#enter").unwrap().id;
    let leave = types.borrow().by_name("wtf.scope#leave").unwrap().id;
    let mut t = 0u64;
    for name in names {
      zone.store_mut().insert(enter, t, Some(ArgumentData::from_pairs([("name", ArgValue::from(*name))])));
      t += 1;
      zone.store_mut().insert(leave, t, None);
      t += 1;
    }
    zone.store_mut().rebuild();
    zone
  }

  fn matched_names(zone: &Zone, result: &query::QueryResult) -> Vec<String> {
    result
      .hits
      .iter()
      .map(|hit| zone.store().get_event(hit.event_id).unwrap().name().to_string())
      .collect()
  }

  #[test]
  fn regex_query_matches_anchored_pattern_s6() {
    let zone = zone_with_names(&["foo", "foobar", "bar"]);
    let result = query::execute("/foo/", std::slice::from_ref(&zone)).unwrap();
    let mut names = matched_names(&zone, &result);
    names.sort();
    assert_eq!(names, vec!["foo", "foobar"]);
  }

  #[test]
  fn substring_query_matches_same_set_as_regex_s6() {
    let zone = zone_with_names(&["foo", "foobar", "bar"]);
    let result = query::execute("foo", std::slice::from_ref(&zone)).unwrap();
    let mut names = matched_names(&zone, &result);
    names.sort();
    assert_eq!(names, vec!["foo", "foobar"]);
  }

  #[test]
  fn path_query_matches_full_name_or_last_segment_suffix_s6() {
    let zone = zone_with_names(&["ns/foo", "other/ns/foo", "foo", "ns/bar"]);
    let result = query::execute("ns/foo", std::slice::from_ref(&zone)).unwrap();
    let mut names = matched_names(&zone, &result);
    names.sort();
    assert_eq!(names, vec!["ns/foo", "other/ns/foo"]);
  }

  #[test]
  fn dump_csv_includes_one_row_per_hit() {
    let zone = zone_with_names(&["foo"]);
    let result = query::execute("foo", std::slice::from_ref(&zone)).unwrap();
    let csv = result.dump_csv(std::slice::from_ref(&zone));
    assert_eq!(csv.lines().count(), 2); // header + one match
    assert!(csv.contains("foo"));
  }

  #[test]
  fn malformed_regex_reports_compile_failure() {
    let err = query::execute("/(/", &[]).unwrap_err();
    assert!(matches!(err, crate::CoreError::QueryCompile(_)));
  }
}
