//! Simulated media clock
//!
//! Elements advance only when told to, which makes playback deterministic
//! for the terminal player and for tests. Every element ever created stays
//! inspectable through the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::media::{MediaBackend, MediaElement, MediaEvent};
use crate::services::Track;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    pub src: String,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub paused: bool,
    pub play_calls: u32,
}

#[derive(Debug, Clone)]
pub struct SimulatedElement {
    src: String,
    state: Arc<Mutex<ElementState>>,
}

impl SimulatedElement {
    fn lock(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ElementState {
        self.lock().clone()
    }

    /// Advances the clock by `seconds` while playing and reports what happened
    pub fn advance(&mut self, seconds: f64) -> Vec<MediaEvent> {
        let mut state = self.lock();
        if state.paused {
            return Vec::new();
        }

        state.current_time += seconds;
        let mut events = vec![MediaEvent::TimeUpdate];
        if state.duration.is_finite() && state.current_time >= state.duration {
            state.current_time = state.duration;
            state.paused = true;
            events.push(MediaEvent::Ended);
        }
        events
    }
}

impl MediaElement for SimulatedElement {
    fn src(&self) -> &str {
        &self.src
    }

    fn play(&mut self) {
        let mut state = self.lock();
        state.paused = false;
        state.play_calls += 1;
    }

    fn pause(&mut self) {
        self.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.lock().current_time = seconds;
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.lock().volume = volume;
    }
}

/// Backend handing out simulated elements with per-source durations
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    durations: HashMap<String, f64>,
    fallback_duration: Option<f64>,
    created: Vec<SimulatedElement>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses each track's reported duration, or `fallback_secs` when missing
    pub fn for_tracks(tracks: &[Track], fallback_secs: Option<f64>) -> Self {
        let durations = tracks
            .iter()
            .filter_map(|t| t.duration.map(|d| (t.audio.clone(), d as f64)))
            .collect();
        Self {
            durations,
            fallback_duration: fallback_secs,
            created: Vec::new(),
        }
    }

    pub fn set_duration(&mut self, src: &str, seconds: f64) {
        self.durations.insert(src.to_string(), seconds);
    }

    /// Every element created so far, oldest first
    pub fn created(&self) -> &[SimulatedElement] {
        &self.created
    }
}

impl MediaBackend for SimulatedBackend {
    type Element = SimulatedElement;

    fn create(&mut self, src: &str, volume: f64) -> SimulatedElement {
        let duration = self
            .durations
            .get(src)
            .copied()
            .or(self.fallback_duration)
            .unwrap_or(f64::NAN);

        let element = SimulatedElement {
            src: src.to_string(),
            state: Arc::new(Mutex::new(ElementState {
                src: src.to_string(),
                current_time: 0.0,
                duration,
                volume,
                paused: true,
                play_calls: 0,
            })),
        };
        self.created.push(element.clone());
        element
    }
}
