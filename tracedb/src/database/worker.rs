//! Optional worker-thread ingestion (§5: "If the implementation chooses to
//! run ingestion on a worker thread, the worker and the reader side must
//! exchange ownership of the store... and the reader must be inactive
//! during rebuild"). [`Database`] itself is not `Send`, since its zones share
//! an `Rc<RefCell<EventTypeTable>>`, so rather than moving a `Database`
//! across threads, the worker owns one exclusively for its lifetime and
//! the two sides exchange only plain, `Send` commands and notifications.
//! This is the single-producer handoff the spec calls for: the reader
//! never touches the store directly, only the `INVALIDATED` notifications
//! the worker emits once a batch is safely committed.

use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Database, DataSourceSink, SourceContext, SourceId, ZoneRef};
use crate::arguments::ArgumentData;

/// A command sent to the ingestion worker. All fields are owned, `Send`
/// values; no reference into the worker's `Database` ever crosses the
/// channel.
pub enum WorkerCommand {
  Initialize { source: SourceId, context: SourceContext },
  AddEvent { source: SourceId, zone: ZoneRef, type_id: u32, time_us: u64, args: Option<ArgumentData> },
  BeginBatch { zone: ZoneRef },
  DiscardBatch { zone: ZoneRef },
  CommitBatch { zone: ZoneRef },
  Shutdown,
}

/// Notification sent back from the worker after a command completes.
/// `Invalidated` carries the zone names committed; `Failed` reports a
/// command that returned an error without crashing the worker.
pub enum WorkerEvent {
  Invalidated { zone_names: Vec<String> },
  Failed { message: String },
}

/// Handle held by the reader side. Dropping it requests a clean shutdown
/// and joins the worker thread; the `Database` built on the worker thread
/// is discarded at that point, since by design nothing but notifications
/// ever leaves the thread while it runs.
pub struct WorkerHandle {
  commands: Sender<WorkerCommand>,
  events: Receiver<WorkerEvent>,
  join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
  pub fn send(&self, command: WorkerCommand) {
    let _ = self.commands.send(command);
  }

  /// Non-blocking poll for the next `INVALIDATED`/failure notification.
  pub fn try_recv(&self) -> Option<WorkerEvent> {
    self.events.try_recv().ok()
  }

  /// Blocks until a notification arrives or the worker shuts down.
  pub fn recv(&self) -> Option<WorkerEvent> {
    self.events.recv().ok()
  }
}

impl Drop for WorkerHandle {
  fn drop(&mut self) {
    let _ = self.commands.send(WorkerCommand::Shutdown);
    if let Some(join) = self.join.take() {
      let _ = join.join();
    }
  }
}

/// Spawns a worker thread that builds its own `Database` via `build` and
/// then drains `WorkerCommand`s from the reader until `Shutdown`. Errors
/// from individual commands are reported as `WorkerEvent::Failed` rather
/// than terminating the worker; only the malformed batch is lost, per §7.
pub fn spawn_worker(build: impl FnOnce() -> Database + Send + 'static) -> WorkerHandle {
  let (cmd_tx, cmd_rx) = unbounded::<WorkerCommand>();
  let (evt_tx, evt_rx) = unbounded::<WorkerEvent>();

  let join = std::thread::spawn(move || {
    let mut db = build();
    while let Ok(command) = cmd_rx.recv() {
      match command {
        WorkerCommand::Initialize { source, context } => {
          if let Err(e) = db.initialize(source, context) {
            let _ = evt_tx.send(WorkerEvent::Failed { message: e.to_string() });
          }
        }
        WorkerCommand::AddEvent { source, zone, type_id, time_us, args } => {
          if let Err(e) = db.add_event(source, zone, type_id, time_us, args) {
            let _ = evt_tx.send(WorkerEvent::Failed { message: e.to_string() });
          }
        }
        WorkerCommand::BeginBatch { zone } => {
          let _ = db.begin_batch(zone);
        }
        WorkerCommand::DiscardBatch { zone } => {
          let _ = db.discard_batch(zone);
        }
        WorkerCommand::CommitBatch { zone } => match db.commit_batch(zone) {
          Ok(()) => {
            let zone_names = db.zone(zone).map(|z| z.name.clone()).into_iter().collect();
            let _ = evt_tx.send(WorkerEvent::Invalidated { zone_names });
          }
          Err(e) => {
            let _ = evt_tx.send(WorkerEvent::Failed { message: e.to_string() });
          }
        },
        WorkerCommand::Shutdown => break,
      }
    }
  });

  WorkerHandle { commands: cmd_tx, events: evt_rx, join: Some(join) }
}
