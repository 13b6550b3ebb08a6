//! Deferred save/load jobs
//!
//! Save and load requests arrive from arbitrary threads but may only touch
//! the machine between steps. Each kind gets one mailbox slot with
//! last-write-wins semantics: a newer unconsumed request silently replaces
//! the older one, and the stepping loop drains at most one job of each kind
//! per step. This is a mailbox, not a FIFO queue.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use tracing::{debug, warn};

/// Detached action run after a job's machine operation succeeds.
///
/// Spawned fire-and-forget; the stepping loop never observes its outcome.
pub type FollowUp = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A pending save or load against a machine state file.
pub struct StateJob {
    /// Snapshot file the machine serializes to / deserializes from.
    pub path: PathBuf,
    /// Optional detached follow-up (e.g. uploading the snapshot).
    pub follow_up: Option<FollowUp>,
}

impl StateJob {
    pub fn new(path: impl Into<PathBuf>, follow_up: Option<FollowUp>) -> Self {
        Self {
            path: path.into(),
            follow_up,
        }
    }
}

impl fmt::Debug for StateJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateJob")
            .field("path", &self.path)
            .field("follow_up", &self.follow_up.is_some())
            .finish()
    }
}

/// One overwritable mailbox slot.
#[derive(Debug, Default)]
struct JobSlot {
    job: Mutex<Option<StateJob>>,
}

impl JobSlot {
    fn put(&self, job: StateJob) {
        let mut slot = self.lock();
        if let Some(old) = slot.as_ref() {
            debug!(
                "superseding unconsumed job for {} with {}",
                old.path.display(),
                job.path.display()
            );
        }
        *slot = Some(job);
    }

    fn take(&self) -> Option<StateJob> {
        self.lock().take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StateJob>> {
        self.job.lock().unwrap_or_else(|e| {
            warn!("job slot mutex poisoned; continuing");
            e.into_inner()
        })
    }
}

/// The save and load mailboxes shared between requesters and the stepping
/// loop.
///
/// `put_*` may be called from any thread at any time. `take_*` is reserved
/// for the stepping loop and atomically checks-and-clears, so a consumed job
/// can never run twice and a request landing after the take stays queued for
/// the next step.
#[derive(Debug, Default)]
pub struct JobQueue {
    save: JobSlot,
    load: JobSlot,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a save job, replacing any unconsumed one.
    pub fn put_save(&self, job: StateJob) {
        self.save.put(job);
    }

    /// Queue a load job, replacing any unconsumed one.
    pub fn put_load(&self, job: StateJob) {
        self.load.put(job);
    }

    /// Take the pending save job, if any. Stepping loop only.
    pub fn take_save(&self) -> Option<StateJob> {
        self.save.take()
    }

    /// Take the pending load job, if any. Stepping loop only.
    pub fn take_load(&self) -> Option<StateJob> {
        self.load.take()
    }
}

/// Run a job's follow-up detached from the stepping loop.
///
/// Failures are logged here and go nowhere else; the step that launched the
/// follow-up has already moved on.
pub(crate) fn spawn_follow_up(kind: &'static str, follow_up: FollowUp) {
    thread::Builder::new()
        .name(format!("retrocast-{kind}-followup"))
        .spawn(move || {
            if let Err(err) = follow_up() {
                warn!("{kind} follow-up failed: {err}");
            }
        })
        .expect("failed to spawn follow-up thread");
}
