/// Background persistence writer
///
/// One task per store consumes snapshots in the order mutations produced
/// them. When several are queued only the newest is saved: every snapshot
/// is a complete list, so the older ones carry nothing the newest lacks.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::storage::HabitBackend;
use crate::store::{Shared, Snapshot};

/// Marks the writer as stopped when the task ends, including by panic
struct StoppedGuard(Arc<Shared>);

impl Drop for StoppedGuard {
    fn drop(&mut self) {
        self.0.status.send_modify(|status| status.writer_stopped = true);
    }
}

pub(crate) enum WriteCommand {
    Persist { version: u64, records: Snapshot },
    Shutdown,
}

pub(crate) async fn run(
    backend: Arc<dyn HabitBackend>,
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    let _stopped = StoppedGuard(Arc::clone(&shared));

    while let Some(command) = rx.recv().await {
        let (mut latest, mut stop) = match command {
            WriteCommand::Persist { version, records } => (Some((version, records)), false),
            WriteCommand::Shutdown => (None, true),
        };

        let mut skipped = 0usize;
        while !stop {
            match rx.try_recv() {
                Ok(WriteCommand::Persist { version, records }) => {
                    if latest.is_some() {
                        skipped += 1;
                    }
                    latest = Some((version, records));
                }
                Ok(WriteCommand::Shutdown) => stop = true,
                Err(_) => break,
            }
        }

        if skipped > 0 {
            debug!("Coalesced {} queued snapshots", skipped);
        }

        if let Some((version, records)) = latest {
            persist(backend.as_ref(), &shared, version, records).await;
        }

        if stop {
            break;
        }
    }

    debug!("Persistence writer stopped");
}

async fn persist(backend: &dyn HabitBackend, shared: &Shared, version: u64, records: Snapshot) {
    shared.remember_state(&records);

    match backend.save_all(&records).await {
        Ok(()) => {
            debug!("Persisted snapshot v{} ({} habits)", version, records.len());
            shared.status.send_modify(|status| {
                status.settled_version = version;
                status.persisted_version = version;
                status.last_error = None;
            });
        }
        Err(e) => {
            shared.forget_state(&records);
            error!("Failed to persist snapshot v{}: {}", version, e);
            shared.status.send_modify(|status| {
                status.settled_version = version;
                status.last_error = Some(e.to_string());
            });
        }
    }
}
