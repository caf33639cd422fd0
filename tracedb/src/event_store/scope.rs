//! Phase 2: re-scope. A single forward pass over the resorted records,
//! walking an explicit stack of open scopes to assign `PARENT`, `DEPTH`,
//! `NEXT_SIBLING`, `END_TIME`, `SYSTEM_TIME` and `CHILD_TIME`.

use super::{
  EventStore, NO_PARENT, OFF_ARGUMENTS, OFF_CHILD_TIME, OFF_DEPTH, OFF_END_TIME,
  OFF_NEXT_SIBLING, OFF_PARENT, OFF_SYSTEM_TIME, OFF_TIME, OFF_TYPE, TYPE_SCOPE_APPEND_DATA,
  TYPE_SCOPE_ENTER, TYPE_SCOPE_LEAVE, TYPE_TRACE_TIME_STAMP,
};
use crate::event_type::{EventType, EventTypeDesc, EventTypeFlags};

struct StackFrame {
  scope_row: usize,
  event_type: EventType,
  child_time_us: u64,
  system_time_us: u64,
  /// Row of the most recent direct child linked into this frame's sibling
  /// chain so far, or `None` before the first one arrives.
  last_child_row: Option<usize>,
}

pub(super) fn rescope(store: &mut EventStore) {
  let n = store.count;
  let mut stack: Vec<StackFrame> = Vec::new();
  let mut root_last_child: Option<usize> = None;
  let mut max_depth: u32 = 0;

  for row in 0..n {
    let parent = stack.last().map(|f| f.scope_row as u32).unwrap_or(NO_PARENT);
    let depth = stack.len() as u32;
    store.set_cell(row, OFF_PARENT, parent);
    store.set_cell(row, OFF_DEPTH, depth);
    max_depth = max_depth.max(depth);
    store.set_cell(row, OFF_NEXT_SIBLING, 0);

    let Some(event_type) = store.type_table.borrow().by_id(store.cell(row, OFF_TYPE)) else {
      continue;
    };

    // A scope's own leave record is not a sibling of that scope's
    // children: it shares their PARENT/DEPTH (assigned above, before the
    // pop below removes the scope from the stack), but it closes the
    // enclosing scope rather than sitting beside its children. Link
    // everything else into the current frame's chain before dispatching.
    if event_type.name.as_ref() != TYPE_SCOPE_LEAVE {
      link_sibling(store, &mut stack, &mut root_last_child, row);
    }

    match event_type.name.as_ref() {
      TYPE_SCOPE_ENTER => {
        let resolved = resolve_named_type(store, row, EventTypeDesc::scope, &event_type);
        store.set_cell(row, OFF_TYPE, resolved.id);
        stack.push(StackFrame { scope_row: row, event_type: resolved, child_time_us: 0, system_time_us: 0, last_child_row: None });
      }
      TYPE_SCOPE_LEAVE => {
        leave_scope(store, row, &mut stack);
      }
      TYPE_SCOPE_APPEND_DATA => {
        append_scope_data(store, row, &stack);
      }
      TYPE_TRACE_TIME_STAMP => {
        let resolved = resolve_named_type(store, row, EventTypeDesc::instance, &event_type);
        store.set_cell(row, OFF_TYPE, resolved.id);
      }
      _ => {
        if event_type.is_scope() {
          stack.push(StackFrame { scope_row: row, event_type: event_type.clone(), child_time_us: 0, system_time_us: 0, last_child_row: None });
        }
      }
    }
  }

  store.max_depth = max_depth;
}

/// Links `row` after the current frame's last recorded direct child,
/// patching that child's `NEXT_SIBLING` to point at `row`, then makes
/// `row` the new last child. With no open frame, links at the top level
/// instead, so multiple root scopes chain together the same way.
fn link_sibling(store: &EventStore, stack: &mut [StackFrame], root_last_child: &mut Option<usize>, row: usize) {
  let slot = match stack.last_mut() {
    Some(frame) => &mut frame.last_child_row,
    None => root_last_child,
  };
  if let Some(prev) = slot.replace(row) {
    store.set_cell(prev, OFF_NEXT_SIBLING, row as u32);
  }
}

fn resolve_named_type(
  store: &mut EventStore,
  row: usize,
  make_desc: fn(String) -> EventTypeDesc,
  fallback: &EventType,
) -> EventType {
  match arg_string(store, row, "name") {
    Some(name) => store.type_table.borrow_mut().define(make_desc(name)),
    None => fallback.clone(),
  }
}

fn arg_string(store: &EventStore, row: usize, key: &str) -> Option<String> {
  use crate::arguments::ArgValue;
  let arg_id = store.cell(row, OFF_ARGUMENTS);
  let args = store.arguments.get(arg_id)?;
  match args.get(key)? {
    ArgValue::String(s) => Some(s.to_string()),
    _ => None,
  }
}

fn leave_scope(store: &mut EventStore, row: usize, stack: &mut Vec<StackFrame>) {
  let Some(popped) = stack.pop() else {
    // Unmatched leave: ignored silently, record stays an instance (its
    // END_TIME is never set).
    tracing::debug!(row, "wtf.scope#leave with no open scope; ignoring");
    return;
  };
  let scope_row = popped.scope_row;
  let end_time = store.cell(row, OFF_TIME);
  let start_time = store.cell(scope_row, OFF_TIME);
  let duration_us = end_time.saturating_sub(start_time) as u64;

  store.set_cell(scope_row, OFF_END_TIME, end_time);
  store.set_cell(scope_row, OFF_SYSTEM_TIME, popped.system_time_us as u32);
  store.set_cell(scope_row, OFF_CHILD_TIME, popped.child_time_us as u32);

  if let Some(new_top) = stack.last_mut() {
    new_top.child_time_us += duration_us;
    let system_time_local = if popped.event_type.flags.contains(EventTypeFlags::SYSTEM_TIME) {
      duration_us
    } else {
      0
    };
    new_top.system_time_us += popped.system_time_us + system_time_local;
  }
}

fn append_scope_data(store: &mut EventStore, row: usize, stack: &[StackFrame]) {
  let Some(target_row) = stack.last().map(|f| f.scope_row) else {
    // No open scope to append to: ignored silently (open question §9).
    tracing::debug!(row, "wtf.scope#appendData with no open scope; ignoring");
    return;
  };
  let patch_id = store.cell(row, OFF_ARGUMENTS);
  if patch_id == 0 {
    return;
  }
  let Some(patch) = store.arguments.get(patch_id).cloned() else {
    return;
  };
  let target_id = store.cell(target_row, OFF_ARGUMENTS);
  if target_id == 0 {
    let new_id = store.arguments.intern(patch);
    store.set_cell(target_row, OFF_ARGUMENTS, new_id);
  } else if let Some(existing) = store.arguments.get_mut(target_id) {
    existing.merge(&patch);
  }
}
