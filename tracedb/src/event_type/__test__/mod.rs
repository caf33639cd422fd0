#[cfg(test)]
mod tests {
  use crate::event_type::{EventClass, EventTypeDesc, EventTypeFlags, EventTypeTable};

  #[test]
  fn ids_assigned_monotonically_from_one() {
    let mut table = EventTypeTable::new();
    let a = table.define(EventTypeDesc::scope("a"));
    let b = table.define(EventTypeDesc::instance("b"));
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
  }

  #[test]
  fn redefinition_returns_existing_entry() {
    let mut table = EventTypeTable::new();
    let first = table.define(EventTypeDesc::scope("wtf.scope#enter"));
    let second = table.define(
      EventTypeDesc::instance("wtf.scope#enter").with_flags(EventTypeFlags::SYSTEM_TIME),
    );
    assert_eq!(first.id, second.id);
    assert!(matches!(second.class, EventClass::Scope));
    assert_eq!(second.flags, EventTypeFlags::NONE);
  }

  #[test]
  fn by_id_zero_is_reserved() {
    let table = EventTypeTable::new();
    assert!(table.by_id(0).is_none());
  }

  #[test]
  fn by_name_roundtrips() {
    let mut table = EventTypeTable::new();
    let ty = table.define(EventTypeDesc::scope("frame"));
    assert_eq!(table.by_name("frame").unwrap().id, ty.id);
    assert!(table.by_name("missing").is_none());
  }
}
