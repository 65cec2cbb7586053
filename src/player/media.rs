//! Media element abstraction

/// Notifications a media element delivers back to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    /// Position or duration changed; read them from the element
    TimeUpdate,
    Ended,
}

/// One playable audio source.
///
/// `duration` is `f64::NAN` until the source reports it.
pub trait MediaElement {
    fn src(&self) -> &str;
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
}

/// Creates media elements for track audio URLs
pub trait MediaBackend {
    type Element: MediaElement;

    fn create(&mut self, src: &str, volume: f64) -> Self::Element;
}
