//! Remote input decoding and the shared button buffer
//!
//! The transport delivers one packed integer per input event: bits 0-7 are
//! pad 0 in wire order, bits 8-15 are pad 1, least significant bit first.
//! Decoding replaces the whole 16-flag buffer at once, so readers never see
//! a half-applied update, and when decodes race, the last one wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::machine::{PAD_BUTTONS, TOTAL_BUTTONS};

/// Pad buttons in wire order. Bit `i` of an input word is button `i` of
/// pad 0; bit `i + 8` is button `i` of pad 1.
///
/// This layout is shared with the transport and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Button {
    A = 0,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    /// Index of this button for the given pad within the 16-flag buffer.
    pub fn index(self, pad: usize) -> usize {
        pad * PAD_BUTTONS + self as usize
    }
}

/// Shared button state between the input pump and the stepping loop.
///
/// A single mutex guards the full buffer; both sides touch it only through
/// whole-buffer operations, so a step can never observe a torn decode.
#[derive(Debug, Default)]
pub struct ButtonBuffer {
    state: Mutex<[bool; TOTAL_BUTTONS]>,
}

impl ButtonBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a packed input word and replace all 16 flags.
    ///
    /// Flag `i` becomes bit `i` of `bits`. An OR-merge with the previous
    /// state (`(old && b) || b`) would collapse to `b` anyway; plain
    /// overwrite is the contract, not a latch.
    pub fn store_bits(&self, bits: u32) {
        let mut state = self.lock_state();
        for (i, flag) in state.iter_mut().enumerate() {
            *flag = (bits >> i) & 1 == 1;
        }
    }

    /// Copy of the full 16-flag state.
    pub fn snapshot(&self) -> [bool; TOTAL_BUTTONS] {
        *self.lock_state()
    }

    /// Snapshot split into the two pads, wire order preserved.
    pub fn pads(&self) -> ([bool; PAD_BUTTONS], [bool; PAD_BUTTONS]) {
        let snapshot = self.snapshot();
        let mut pad0 = [false; PAD_BUTTONS];
        let mut pad1 = [false; PAD_BUTTONS];
        pad0.copy_from_slice(&snapshot[..PAD_BUTTONS]);
        pad1.copy_from_slice(&snapshot[PAD_BUTTONS..]);
        (pad0, pad1)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, [bool; TOTAL_BUTTONS]> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("button buffer mutex poisoned; continuing");
            e.into_inner()
        })
    }
}

/// Background thread draining the inbound input stream into a
/// [`ButtonBuffer`].
///
/// Runs for the session's lifetime. It exits when the transport drops its
/// sender or when [`InputPump::stop`] raises the stop flag; the flag is
/// checked on a `recv_timeout` cadence so shutdown never waits on a quiet
/// transport.
pub struct InputPump {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputPump {
    /// Spawn the pump thread over an input word stream.
    pub fn spawn(
        input: Receiver<u32>,
        buttons: Arc<ButtonBuffer>,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("retrocast-input".into())
            .spawn(move || {
                debug!("input pump started");
                loop {
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    match input.recv_timeout(poll_interval) {
                        Ok(bits) => buttons.store_bits(bits),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("input pump exiting (transport disconnected)");
                            break;
                        }
                    }
                }
                debug!("input pump finished");
            })
            .expect("failed to spawn input pump thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the pump to exit and wait for it.
    ///
    /// Idempotent; also invoked on drop.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.stop();
    }
}
