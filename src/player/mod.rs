//! # Player Module
//!
//! Playback controller for a catalog track list:
//! - `controller`: the state machine (play, pause, next/prev, shuffle, repeat, seek, volume)
//! - `media`: the media element seam the controller drives
//! - `simulated`: an in-process media clock used by the headless player and tests
//! - `keys` / `format`: keyboard mapping and `m:ss` time display

pub mod controller;
pub mod format;
pub mod keys;
pub mod media;
pub mod simulated;


pub use controller::{Player, PlayerError};
pub use format::format_time;
pub use keys::{Key, KeyOutcome};
pub use media::{MediaBackend, MediaElement, MediaEvent};
pub use simulated::{SimulatedBackend, SimulatedElement};
