//! Playback state machine

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use super::keys::{Key, KeyOutcome};
use super::media::{MediaBackend, MediaElement, MediaEvent};
use crate::services::Track;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("No tracks loaded")]
    NoTracks,

    #[error("Track index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Drives one active media element over a list of tracks.
///
/// Only the most recently started element is ever active; starting another
/// track pauses and rewinds the previous one.
pub struct Player<B: MediaBackend> {
    backend: B,
    tracks: Vec<Track>,
    current_index: usize,
    active: Option<B::Element>,
    is_playing: bool,
    progress: f64,
    duration: f64,
    volume: f64,
    shuffle: bool,
    repeat: bool,
    rng: StdRng,
}

impl<B: MediaBackend> Player<B> {
    pub fn new(backend: B, tracks: Vec<Track>) -> Self {
        Self::with_rng(backend, tracks, StdRng::from_entropy())
    }

    /// Deterministic shuffle order for a given seed
    pub fn with_seed(backend: B, tracks: Vec<Track>, seed: u64) -> Self {
        Self::with_rng(backend, tracks, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(backend: B, tracks: Vec<Track>, rng: StdRng) -> Self {
        Self {
            backend,
            tracks,
            current_index: 0,
            active: None,
            is_playing: false,
            progress: 0.0,
            duration: 0.0,
            volume: 1.0,
            shuffle: false,
            repeat: false,
            rng,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Replaces the track list. The active element keeps playing.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.active.as_ref()?;
        self.tracks.get(self.current_index)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_shuffling(&self) -> bool {
        self.shuffle
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn active_element(&self) -> Option<&B::Element> {
        self.active.as_ref()
    }

    pub fn active_element_mut(&mut self) -> Option<&mut B::Element> {
        self.active.as_mut()
    }

    /// Starts the track at `index` on a fresh element
    pub fn play_track(&mut self, index: usize) -> Result<(), PlayerError> {
        if self.tracks.is_empty() {
            return Err(PlayerError::NoTracks);
        }
        let track = self.tracks.get(index).ok_or(PlayerError::IndexOutOfRange {
            index,
            len: self.tracks.len(),
        })?;

        if let Some(previous) = self.active.as_mut() {
            previous.pause();
            previous.set_current_time(0.0);
        }

        let mut element = self.backend.create(&track.audio, self.volume);
        info!(index, track_id = %track.id, name = %track.name, "Playing track");

        self.current_index = index;
        self.is_playing = true;
        self.progress = 0.0;
        element.play();
        self.active = Some(element);
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) {
        let Some(element) = self.active.as_mut() else {
            return;
        };
        if self.is_playing {
            element.pause();
            self.is_playing = false;
        } else {
            element.play();
            self.is_playing = true;
        }
    }

    pub fn next_track(&mut self) -> Result<(), PlayerError> {
        let len = self.tracks.len();
        if len == 0 {
            return Err(PlayerError::NoTracks);
        }
        let next = if self.shuffle {
            self.rng.gen_range(0..len)
        } else {
            (self.current_index + 1) % len
        };
        self.play_track(next)
    }

    pub fn prev_track(&mut self) -> Result<(), PlayerError> {
        let len = self.tracks.len();
        if len == 0 {
            return Err(PlayerError::NoTracks);
        }
        let prev = (self.current_index % len + len - 1) % len;
        self.play_track(prev)
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    /// Moves the active element to `seconds`, clamped to the known duration
    pub fn seek(&mut self, seconds: f64) {
        let Some(element) = self.active.as_mut() else {
            return;
        };
        let duration = element.duration();
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if duration.is_finite() && duration > 0.0 {
            target = target.min(duration);
        }
        element.set_current_time(target);
        self.progress = target;
    }

    /// Clamps to `[0, 1]`; only the active element is affected
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume = volume;
        if let Some(element) = self.active.as_mut() {
            element.set_volume(volume);
        }
    }

    /// Applies a notification from the active element
    pub fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Play => self.is_playing = true,
            MediaEvent::Pause => self.is_playing = false,
            MediaEvent::TimeUpdate => {
                if let Some(element) = self.active.as_ref() {
                    self.progress = element.current_time();
                    let duration = element.duration();
                    self.duration = if duration.is_finite() { duration } else { 0.0 };
                }
            }
            MediaEvent::Ended => self.on_ended(),
        }
    }

    fn on_ended(&mut self) {
        if self.repeat {
            if let Some(element) = self.active.as_mut() {
                debug!(index = self.current_index, "Repeating track");
                element.set_current_time(0.0);
                element.play();
                self.progress = 0.0;
                self.is_playing = true;
            }
        } else if let Err(e) = self.next_track() {
            debug!(error = %e, "Track ended with nothing to advance to");
            self.is_playing = false;
        }
    }

    pub fn handle_key(&mut self, key: &Key) -> KeyOutcome {
        match key {
            Key::Space => {
                self.toggle_play_pause();
                KeyOutcome::PreventDefault
            }
            Key::Other(_) => KeyOutcome::PassThrough,
        }
    }
}
