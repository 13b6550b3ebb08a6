//! Shared test machine for unit tests

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::machine::{AudioSink, Machine, PAD_BUTTONS, VideoFrame};

/// Scripted machine recording every call a session makes.
///
/// Snapshot files hold the step counter as little-endian bytes, so
/// save/load round trips restore observable state through the real
/// filesystem.
#[derive(Default)]
pub struct TestMachine {
    /// Monotonic state advanced by stepping; what snapshots capture.
    pub counter: u64,
    /// Every `step_seconds` delta, in call order.
    pub steps: Vec<f64>,
    /// Number of power cycles.
    pub resets: u32,
    /// Last latched pad state.
    pub pads: [[bool; PAD_BUTTONS]; 2],
    /// Battery RAM, `None` for a batteryless cartridge.
    pub battery: Option<Vec<u8>>,
    /// Currently bound audio output.
    pub sink: Option<AudioSink>,
    pub sample_rate: u32,
    /// Attempted snapshot writes, in call order.
    pub saves: Vec<PathBuf>,
    /// Attempted snapshot reads, in call order.
    pub loads: Vec<PathBuf>,
    /// Make every `save_state` fail after recording the attempt.
    pub fail_saves: bool,
}

impl TestMachine {
    pub fn with_battery(contents: Vec<u8>) -> Self {
        Self {
            battery: Some(contents),
            ..Self::default()
        }
    }
}

/// Write a snapshot file in [`TestMachine`]'s format.
pub fn write_snapshot(path: &Path, counter: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, counter.to_le_bytes()).unwrap();
}

impl Machine for TestMachine {
    fn reset(&mut self) {
        self.resets += 1;
        self.counter = 0;
    }

    fn step_seconds(&mut self, dt: f64) {
        self.steps.push(dt);
        if dt > 0.0 {
            self.counter += 1;
        }
        if let Some(sink) = &self.sink {
            sink.push(0.25);
        }
    }

    fn save_state(&mut self, path: &Path) -> Result<()> {
        self.saves.push(path.to_path_buf());
        if self.fail_saves {
            bail!("scripted save failure");
        }
        fs::write(path, self.counter.to_le_bytes())
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<()> {
        self.loads.push(path.to_path_buf());
        let bytes =
            fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
        let bytes: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .context("snapshot has the wrong length")?;
        self.counter = u64::from_le_bytes(bytes);
        Ok(())
    }

    fn frame(&self) -> VideoFrame {
        VideoFrame {
            width: 1,
            height: 1,
            pixels: vec![self.counter as u8, 0, 0, 0xFF],
        }
    }

    fn set_buttons(&mut self, pad: usize, buttons: [bool; PAD_BUTTONS]) {
        self.pads[pad] = buttons;
    }

    fn set_audio_sink(&mut self, sink: Option<AudioSink>) {
        self.sink = sink;
    }

    fn set_audio_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate;
    }

    fn has_battery(&self) -> bool {
        self.battery.is_some()
    }

    fn battery(&self) -> Option<Vec<u8>> {
        self.battery.clone()
    }

    fn load_battery(&mut self, image: &[u8]) -> Result<()> {
        if self.battery.is_none() {
            bail!("cartridge has no battery");
        }
        self.battery = Some(image.to_vec());
        Ok(())
    }
}
