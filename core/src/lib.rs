//! Retrocast Core - per-session view controller for streamed emulated
//! machines
//!
//! This crate sits between a network input transport and an emulation core:
//! it decodes remote button words into shared pad state, steps the owned
//! machine in real time, streams rendered frames and audio outward, and
//! coordinates out-of-band save/restore without stalling the stepping
//! cadence.
//!
//! # Architecture
//!
//! - [`Machine`] - Capability trait implemented by each emulation core
//! - [`GameSession`] - Lifecycle (enter/exit) plus the real-time stepping driver
//! - [`ButtonBuffer`] / [`InputPump`] - Shared pad state fed by the input stream
//! - [`JobQueue`] - Single-slot save/load mailboxes drained at step boundaries

pub mod config;
pub mod input;
pub mod jobs;
pub mod machine;
pub mod persist;
pub mod session;
#[cfg(test)]
pub mod test_utils;

// Re-export core traits and types
pub use config::{Config, DEFAULT_SAMPLE_RATE};
pub use input::{Button, ButtonBuffer, InputPump};
pub use jobs::{FollowUp, JobQueue, StateJob};
pub use machine::{AudioSink, Machine, PAD_BUTTONS, TOTAL_BUTTONS, VideoFrame};
pub use persist::{PersistError, battery_path, read_battery, snapshot_path, write_battery};
pub use session::{
    EnterOutcome, GameSession, SessionChannels, SessionError, SessionHandle, SessionMeta,
};
