/*!
 * Debounced background writer for the progress state file.
 *
 * Mutations push tagged save requests into a bounded channel and return at
 * once. A single task drains the channel:
 * - normal requests are coalesced so at most one write happens per debounce
 *   window;
 * - important requests are written within `important_delay` of the previous
 *   write;
 * - `Shutdown` writes the latest state, acknowledges and stops the task.
 */

use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use super::models::{JobState, timestamp_now};
use crate::file_utils::FileManager;

/// Urgency of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SavePriority {
    /// Fragment-level changes, coalesced within the debounce window
    Normal,
    /// Chapter milestones and job creation
    Important,
}

/// Timing knobs of the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterTiming {
    pub debounce: Duration,
    pub important_delay: Duration,
    pub queue_capacity: usize,
}

impl Default for WriterTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2_000),
            important_delay: Duration::from_millis(500),
            queue_capacity: 64,
        }
    }
}

impl WriterTiming {
    /// Earliest instant a write of `priority` may happen
    fn deadline(&self, last_save: Option<Instant>, priority: SavePriority) -> Instant {
        let now = Instant::now();
        let interval = match priority {
            SavePriority::Normal => self.debounce,
            SavePriority::Important => self.important_delay,
        };
        match last_save {
            Some(last) => (last + interval).max(now),
            None => now,
        }
    }
}

pub(crate) enum SaveRequest {
    Save(SavePriority),
    Shutdown(oneshot::Sender<()>),
}

/// Shared state plus the file it is mirrored to
pub(crate) struct StateFile {
    pub(crate) path: PathBuf,
    pub(crate) state: Mutex<Option<JobState>>,
}

impl StateFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(None),
        }
    }

    /// Snapshot the state under the lock and write it atomically.
    /// Failures are logged, never returned.
    pub(crate) async fn persist(&self) {
        let serialized = {
            let mut guard = self.state.lock();
            match guard.as_mut() {
                Some(job) => {
                    job.last_update = timestamp_now();
                    serde_json::to_vec_pretty(job)
                }
                None => return,
            }
        };

        let bytes = match serialized {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize progress state: {}", e);
                return;
            }
        };

        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || FileManager::write_atomic(&path, &bytes)).await {
            Ok(Ok(())) => trace!("Progress saved to {:?}", self.path),
            Ok(Err(e)) => error!("Failed to write progress file {:?}: {}", self.path, e),
            Err(e) => error!("Progress write task panicked: {}", e),
        }
    }
}

/// Producer side of the writer task
pub(crate) struct SaveWriter {
    sender: mpsc::Sender<SaveRequest>,
    handle: JoinHandle<()>,
    important_dropped: Arc<AtomicBool>,
}

impl SaveWriter {
    /// Spawn the writer task on the current tokio runtime
    pub(crate) fn spawn(file: Arc<StateFile>, timing: WriterTiming) -> Self {
        let (sender, receiver) = mpsc::channel(timing.queue_capacity.max(1));
        let important_dropped = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run(file, receiver, timing, Arc::clone(&important_dropped)));

        Self {
            sender,
            handle,
            important_dropped,
        }
    }

    /// Queue a save without waiting.
    ///
    /// A full queue already guarantees a pending write, so the request is
    /// dropped; an important one leaves a flag that upgrades that write.
    pub(crate) fn request(&self, priority: SavePriority) {
        match self.sender.try_send(SaveRequest::Save(priority)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if priority == SavePriority::Important {
                    self.important_dropped.store(true, Ordering::SeqCst);
                }
                trace!("Save queue full, {:?} request coalesced", priority);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Progress writer already stopped, save request ignored");
            }
        }
    }

    /// Write the final state and stop the task
    pub(crate) async fn shutdown(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.sender.send(SaveRequest::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        drop(self.sender);

        if let Err(e) = self.handle.await {
            error!("Progress writer task failed: {}", e);
        }
    }
}

async fn run(
    file: Arc<StateFile>,
    mut receiver: mpsc::Receiver<SaveRequest>,
    timing: WriterTiming,
    important_dropped: Arc<AtomicBool>,
) {
    let mut last_save: Option<Instant> = None;

    while let Some(request) = receiver.recv().await {
        let mut priority = match request {
            SaveRequest::Save(priority) => priority,
            SaveRequest::Shutdown(ack) => {
                file.persist().await;
                let _ = ack.send(());
                debug!("Progress writer stopped");
                return;
            }
        };
        if important_dropped.swap(false, Ordering::SeqCst) {
            priority = SavePriority::Important;
        }

        let mut deadline = timing.deadline(last_save, priority);
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                next = receiver.recv() => match next {
                    Some(SaveRequest::Save(next_priority)) => {
                        let upgraded = next_priority == SavePriority::Important
                            || important_dropped.swap(false, Ordering::SeqCst);
                        if upgraded && priority == SavePriority::Normal {
                            priority = SavePriority::Important;
                            deadline = deadline.min(timing.deadline(last_save, priority));
                        }
                    }
                    Some(SaveRequest::Shutdown(ack)) => {
                        file.persist().await;
                        let _ = ack.send(());
                        debug!("Progress writer stopped");
                        return;
                    }
                    None => {
                        file.persist().await;
                        return;
                    }
                }
            }
        }

        file.persist().await;
        last_save = Some(Instant::now());
    }
}
