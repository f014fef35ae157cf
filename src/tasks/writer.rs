//! Write-Behind Worker
//!
//! Drains deferred disk writes from a queue, one at a time, in the order
//! they were acknowledged.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::Tiers;

/// A unit of work for the write-behind worker.
#[derive(Debug)]
pub(crate) enum WriteJob {
    /// Persist `key` if it is still the version stamped `write_seq`
    Save { key: String, write_seq: u64 },
    /// Signalled once every job queued before it has been applied
    Flush(oneshot::Sender<()>),
}

/// Spawns the worker. It exits once every sender has been dropped.
pub(crate) fn spawn_write_behind_worker(
    tiers: Arc<Tiers>,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            match job {
                WriteJob::Save { key, write_seq } => {
                    tiers.apply_deferred_write(&key, write_seq).await;
                }
                WriteJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Write-behind worker stopped");
    })
}
