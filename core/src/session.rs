//! Session lifecycle and the real-time stepping driver
//!
//! A [`GameSession`] owns one machine for the lifetime of one remote
//! session. Remote input lands in the shared button buffer through the input
//! pump; an external scheduler calls [`GameSession::step`] once per tick;
//! save/load requests queue into single-slot mailboxes and are drained at
//! the next step boundary, so slow snapshot I/O never tears the machine
//! state mid-step.
//!
//! Lifecycle: created → `enter()` → active (stepping) → `exit()`. There is
//! no way back to active; a new session needs a new `GameSession`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::input::{ButtonBuffer, InputPump};
use crate::jobs::{self, FollowUp, JobQueue, StateJob};
use crate::machine::{AudioSink, Machine, VideoFrame};
use crate::persist::{self, PersistError};

/// Tick gaps above this are scheduler stalls, not simulated time.
const MAX_STEP_SECONDS: f64 = 1.0;

/// Immutable identity of one session, fixed at creation.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Human-readable game title.
    pub title: String,
    /// Content hash keying the session's snapshot and battery files.
    pub hash: String,
}

/// How `enter()` brought the machine up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// A prior snapshot existed; the session resumed exactly where it left
    /// off, with no reset.
    Resumed,
    /// No usable snapshot; the machine was power-cycled (and the battery
    /// image restored, when one existed).
    Fresh,
}

/// Lifecycle misuse errors.
///
/// Save/load I/O failures never surface here; they are logged and the
/// session keeps stepping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `exit()` before `enter()`.
    #[error("session was never entered")]
    NotEntered,

    /// `enter()` on an already active session.
    #[error("session already entered")]
    AlreadyEntered,

    /// `enter()` or `exit()` after `exit()`.
    #[error("session already exited")]
    AlreadyExited,

    /// No storage root could be resolved for persistence artifacts.
    #[error("no storage directory available (set storage_dir in the config)")]
    StorageUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Active,
    Exited,
}

/// Transport endpoints handed to a new session.
pub struct SessionChannels {
    /// Inbound packed input words from the remote transport.
    pub input: Receiver<u32>,
    /// Outbound rendered frames. Bounded: when the consumer lags, frame
    /// publishing blocks and the stepping cadence slows with it.
    pub frames: SyncSender<VideoFrame>,
    /// Outbound mono audio samples, pushed by the machine while stepping.
    pub audio: AudioSink,
}

/// Cloneable control surface for out-of-band requests.
///
/// Safe to hand to any thread; requests take effect at the session's next
/// step boundary.
#[derive(Clone)]
pub struct SessionHandle {
    jobs: Arc<JobQueue>,
    snapshot_path: PathBuf,
    stop: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Queue a full-state save to the session's snapshot file.
    ///
    /// Replaces any unconsumed save request. The follow-up runs detached
    /// after the snapshot is written.
    pub fn request_save(&self, follow_up: Option<FollowUp>) {
        self.jobs
            .put_save(StateJob::new(self.snapshot_path.clone(), follow_up));
    }

    /// Queue a full-state load from an arbitrary snapshot file.
    ///
    /// Replaces any unconsumed load request.
    pub fn request_load(&self, path: impl Into<PathBuf>, follow_up: Option<FollowUp>) {
        self.jobs.put_load(StateJob::new(path, follow_up));
    }

    /// Ask the built-in drive loop to wind down after its current tick.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// One remote session driving one machine.
pub struct GameSession<M: Machine> {
    machine: M,
    meta: SessionMeta,
    config: Config,
    snapshot_path: PathBuf,
    battery_path: PathBuf,
    buttons: Arc<ButtonBuffer>,
    jobs: Arc<JobQueue>,
    frames: SyncSender<VideoFrame>,
    audio: AudioSink,
    pump: InputPump,
    stop: Arc<AtomicBool>,
    consumer_gone: bool,
    phase: Phase,
}

impl<M: Machine> GameSession<M> {
    /// Create a session around a machine and its transport endpoints.
    ///
    /// Spawns the input pump immediately; the machine itself stays untouched
    /// until [`enter`](Self::enter).
    pub fn new(
        machine: M,
        meta: SessionMeta,
        channels: SessionChannels,
        config: Config,
    ) -> Result<Self, SessionError> {
        let root = config
            .storage_root()
            .ok_or(SessionError::StorageUnavailable)?;
        let snapshot_path = persist::snapshot_path(&root, &meta.hash);
        let battery_path = persist::battery_path(&root, &meta.hash);

        let buttons = Arc::new(ButtonBuffer::new());
        let pump = InputPump::spawn(
            channels.input,
            Arc::clone(&buttons),
            Duration::from_millis(config.input_poll_ms),
        );

        info!("session created: {} ({})", meta.title, meta.hash);

        Ok(Self {
            machine,
            meta,
            config,
            snapshot_path,
            battery_path,
            buttons,
            jobs: Arc::new(JobQueue::new()),
            frames: channels.frames,
            audio: channels.audio,
            pump,
            stop: Arc::new(AtomicBool::new(false)),
            consumer_gone: false,
            phase: Phase::Created,
        })
    }

    /// Control handle for requests from other threads.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            jobs: Arc::clone(&self.jobs),
            snapshot_path: self.snapshot_path.clone(),
            stop: Arc::clone(&self.stop),
        }
    }

    /// Shared button buffer, for transports that bypass the input pump.
    pub fn buttons(&self) -> Arc<ButtonBuffer> {
        Arc::clone(&self.buttons)
    }

    /// Session identity.
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Bring the machine up for this session.
    ///
    /// Binds audio, then resumes from the session snapshot when one exists
    /// (this is how a departed participant rejoins an in-progress game).
    /// Otherwise the machine is power-cycled and, for battery-backed
    /// cartridges, a persisted battery image is restored. A missing snapshot
    /// or battery image is the fresh-start case, not an error.
    pub fn enter(&mut self) -> Result<EnterOutcome, SessionError> {
        match self.phase {
            Phase::Created => {}
            Phase::Active => return Err(SessionError::AlreadyEntered),
            Phase::Exited => return Err(SessionError::AlreadyExited),
        }
        self.phase = Phase::Active;

        self.machine
            .set_audio_sample_rate(self.config.audio_sample_rate);
        self.machine.set_audio_sink(Some(self.audio.clone()));

        match self.machine.load_state(&self.snapshot_path) {
            Ok(()) => {
                info!(
                    "session {} resumed from {}",
                    self.meta.hash,
                    self.snapshot_path.display()
                );
                return Ok(EnterOutcome::Resumed);
            }
            Err(err) => {
                debug!("no resumable snapshot ({err}); starting fresh");
            }
        }

        self.machine.reset();

        if self.machine.has_battery() {
            match persist::read_battery(&self.battery_path) {
                Ok(image) => {
                    if let Err(err) = self.machine.load_battery(&image) {
                        warn!("machine rejected battery image: {err}");
                    }
                }
                Err(PersistError::NotFound(_)) => {
                    debug!("no battery image; cartridge starts blank");
                }
                Err(err) => warn!("battery image unreadable: {err}"),
            }
        }

        Ok(EnterOutcome::Fresh)
    }

    /// Wind the session down.
    ///
    /// Stops the input pump, detaches audio, and persists the battery image
    /// for battery-backed cartridges. Full machine state is *not* persisted
    /// here; only explicit save requests write snapshots.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Active => {}
            Phase::Created => return Err(SessionError::NotEntered),
            Phase::Exited => return Err(SessionError::AlreadyExited),
        }
        self.phase = Phase::Exited;

        // No input may land once teardown starts.
        self.pump.stop();

        self.machine.set_audio_sink(None);
        self.machine.set_audio_sample_rate(0);

        if self.machine.has_battery() {
            if let Some(image) = self.machine.battery() {
                match persist::write_battery(&self.battery_path, &image) {
                    Ok(()) => info!("battery image saved: {}", self.battery_path.display()),
                    Err(err) => warn!("battery image save failed: {err}"),
                }
            }
        }

        info!("session exited: {}", self.meta.hash);
        Ok(())
    }

    /// Advance the session by one tick of `elapsed_seconds` wall time.
    ///
    /// Applies pad state, drains at most one save and one load job, steps
    /// the machine, and publishes the rendered frame. The frame send blocks
    /// when the consumer lags; emulation speed is deliberately coupled to
    /// frame consumption.
    ///
    /// Jobs run *before* the machine advances, so a written snapshot
    /// captures the machine as of the previous tick and a loaded one is the
    /// state actually advanced and rendered this tick.
    pub fn step(&mut self, elapsed_seconds: f64) {
        if self.phase != Phase::Active {
            warn!("step ignored: session not active");
            return;
        }

        // A stalled scheduler hands us a huge gap; simulating it would burst
        // frames and desync audio. Skip time advancement instead.
        let dt = if elapsed_seconds > MAX_STEP_SECONDS {
            0.0
        } else {
            elapsed_seconds
        };

        let (pad0, pad1) = self.buttons.pads();
        self.machine.set_buttons(0, pad0);
        self.machine.set_buttons(1, pad1);

        self.drain_jobs();

        self.machine.step_seconds(dt);

        if self.frames.send(self.machine.frame()).is_err() && !self.consumer_gone {
            self.consumer_gone = true;
            debug!("frame consumer disconnected");
        }
    }

    /// Drive the session at the configured tick rate.
    ///
    /// Convenience loop for hosts without their own scheduler: measures
    /// elapsed wall time per tick and calls [`step`](Self::step) until the
    /// frame consumer disconnects, [`SessionHandle::request_stop`] is
    /// called, or the session leaves the active phase.
    pub fn run(&mut self) {
        let tick = Duration::from_secs_f64(1.0 / self.config.tick_rate.max(1) as f64);
        let mut last = Instant::now();

        while self.phase == Phase::Active
            && !self.consumer_gone
            && !self.stop.load(Ordering::Relaxed)
        {
            let now = Instant::now();
            self.step((now - last).as_secs_f64());
            last = now;

            if let Some(remaining) = tick.checked_sub(now.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        debug!("drive loop finished: {}", self.meta.hash);
    }

    /// Queue a full-state save to the session's snapshot file.
    pub fn request_save(&self, follow_up: Option<FollowUp>) {
        self.jobs
            .put_save(StateJob::new(self.snapshot_path.clone(), follow_up));
    }

    /// Queue a full-state load from an arbitrary snapshot file.
    pub fn request_load(&self, path: impl Into<PathBuf>, follow_up: Option<FollowUp>) {
        self.jobs.put_load(StateJob::new(path, follow_up));
    }

    /// Execute at most one pending save and one pending load.
    ///
    /// A failed machine operation is logged and the job discarded; the
    /// follow-up only runs when the operation succeeded.
    fn drain_jobs(&mut self) {
        if let Some(job) = self.jobs.take_save() {
            match self.machine.save_state(&job.path) {
                Ok(()) => {
                    debug!("state saved: {}", job.path.display());
                    if let Some(follow_up) = job.follow_up {
                        jobs::spawn_follow_up("save", follow_up);
                    }
                }
                Err(err) => warn!("state save to {} failed: {err}", job.path.display()),
            }
        }

        if let Some(job) = self.jobs.take_load() {
            match self.machine.load_state(&job.path) {
                Ok(()) => {
                    debug!("state loaded: {}", job.path.display());
                    if let Some(follow_up) = job.follow_up {
                        jobs::spawn_follow_up("load", follow_up);
                    }
                }
                Err(err) => warn!("state load from {} failed: {err}", job.path.display()),
            }
        }
    }
}
