//! Machine capability trait and media types
//!
//! Each emulation core (NES, Game Boy, ...) implements the [`Machine`] trait
//! to plug into a session. The session never looks inside the machine: it
//! resets it, steps it by wall-clock seconds, snapshots it to opaque files,
//! and pulls rendered frames out of it.

use std::path::Path;
use std::sync::mpsc;

use anyhow::Result;

/// Number of buttons on one pad.
pub const PAD_BUTTONS: usize = 8;

/// Two pads share a session; the wire carries both in one word.
pub const TOTAL_BUTTONS: usize = PAD_BUTTONS * 2;

/// One rendered frame, RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Best-effort sink for mono audio samples.
///
/// Machines push samples here as a side effect of stepping. A disconnected
/// consumer is ignored: audio must never stall the stepping loop.
#[derive(Debug, Clone)]
pub struct AudioSink {
    tx: mpsc::Sender<f32>,
}

impl AudioSink {
    pub fn new(tx: mpsc::Sender<f32>) -> Self {
        Self { tx }
    }

    /// Push a single sample, dropping it if the consumer is gone.
    pub fn push(&self, sample: f32) {
        let _ = self.tx.send(sample);
    }

    /// Push a batch of samples, stopping early if the consumer is gone.
    pub fn push_slice(&self, samples: &[f32]) {
        for &sample in samples {
            if self.tx.send(sample).is_err() {
                break;
            }
        }
    }
}

/// Capability contract for an emulated machine.
///
/// Implemented by each concrete emulation core. All methods are called from
/// the session that owns the machine; the session guarantees that stepping,
/// state snapshots, and pad updates never overlap.
///
/// Snapshot and battery formats are whatever the machine's own
/// serialization defines; the session treats both as opaque bytes at a
/// path.
pub trait Machine: Send {
    /// Power-cycle to the machine's reset state.
    fn reset(&mut self);

    /// Advance emulation by `dt` seconds of simulated time.
    ///
    /// Audio samples produced along the way go to the bound [`AudioSink`],
    /// if any.
    fn step_seconds(&mut self, dt: f64);

    /// Serialize the full machine state to `path`.
    fn save_state(&mut self, path: &Path) -> Result<()>;

    /// Restore the full machine state from `path`.
    ///
    /// On failure the machine must be left in its prior state.
    fn load_state(&mut self, path: &Path) -> Result<()>;

    /// The most recently rendered frame.
    fn frame(&self) -> VideoFrame;

    /// Latch button state for pad 0 or 1, in wire order (see
    /// [`Button`](crate::input::Button)).
    fn set_buttons(&mut self, pad: usize, buttons: [bool; PAD_BUTTONS]);

    /// Bind or detach the audio output.
    fn set_audio_sink(&mut self, sink: Option<AudioSink>);

    /// Set the audio sample rate in Hz; 0 while detached.
    fn set_audio_sample_rate(&mut self, rate: u32);

    /// Whether the cartridge has battery-backed RAM.
    fn has_battery(&self) -> bool;

    /// Current battery RAM contents, `None` for batteryless cartridges.
    fn battery(&self) -> Option<Vec<u8>>;

    /// Replace battery RAM with a previously persisted image.
    fn load_battery(&mut self, image: &[u8]) -> Result<()>;
}
