//! Video Backend Surface
//!
//! The three provider players expose wildly different APIs; this trait
//! normalizes them to one capability set so the reconciler never branches on
//! provider. Only backend selection looks at the playlist entry's provider.

use crate::sync::{PlaybackState, Provider, Video};

/// Which embed implementation a playlist entry needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Youtube,
    Vimeo,
}

impl BackendKind {
    pub fn for_video(video: &Video) -> Self {
        match video.provider {
            None => BackendKind::Native,
            Some(Provider::Youtube) => BackendKind::Youtube,
            Some(Provider::Vimeo) => BackendKind::Vimeo,
        }
    }
}

/// Normalized lifecycle events from the underlying element or embed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// Playback is running again, including after a buffering stall
    Playing,
    Paused,
    Buffering,
    /// A newly loaded video finished cueing
    Cued,
    DurationChanged(u64),
}

/// Drift beyond which a backend seeks instead of letting playback run
pub const SEEK_THRESHOLD_MS: u64 = 1000;

/// Uniform capability set over the heterogeneous provider players
pub trait VideoBackend {
    fn kind(&self) -> BackendKind;
    fn current_time_ms(&self) -> u64;
    fn duration_ms(&self) -> u64;
    fn playing(&self) -> bool;
    /// Apply canonical state: load a changed source, correct drift beyond
    /// [`SEEK_THRESHOLD_MS`], and reconcile play/pause. Autoplay rejections
    /// are surfaced through the player callback, never returned.
    fn set_state(&mut self, playlist: &[Video], state: &PlaybackState);
    fn handle_media_event(&mut self, event: MediaEvent);
    /// Tear down the underlying element or embed
    fn remove(&mut self);
}
