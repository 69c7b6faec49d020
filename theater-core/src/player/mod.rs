//! Client Reconciler
//!
//! Each viewing session holds one `Player`: the last canonical state the
//! server pushed, the playlist, and at most one live video backend. The
//! player applies canonical state directly and lets the backend's own clock
//! run between pushes; the server's reconcile pass catches any drift through
//! the periodic report.

mod backend;
mod native;
mod vimeo;
mod youtube;

pub use backend::{BackendKind, MediaEvent, VideoBackend, SEEK_THRESHOLD_MS};
pub use native::{MediaElement, NativeBackend};
pub use vimeo::{VimeoBackend, VimeoEmbed};
pub use youtube::{YoutubeBackend, YoutubeEmbed, YoutubePlayerState};

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::sync::{PlaybackState, Video};

/// How often the player reports its effective state to the engine
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// The underlying player refused to start playback, which is how browser
/// autoplay policies surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackRejected;

/// Prompt shown when programmatic playback was rejected
pub const AUTOPLAY_PROMPT: &str = "Playback was blocked by your browser - press play to watch.";

/// Hooks a backend uses to reach back into the session
pub trait PlayerCallback: Send + Sync {
    /// Ask the server for fresh canonical state, typically after the backend
    /// fell behind while buffering
    fn request_state(&self);
    /// Show the viewer an actionable prompt
    fn show_prompt(&self, message: &str);
}

/// Builds backends for the reconciler; the concrete factory owns whatever
/// page/embed plumbing each provider needs
pub trait BackendFactory {
    fn create(&self, kind: BackendKind, callback: Arc<dyn PlayerCallback>)
        -> Box<dyn VideoBackend>;
}

pub struct Player {
    playlist: Vec<Video>,
    state: PlaybackState,
    backend: Option<Box<dyn VideoBackend>>,
    factory: Box<dyn BackendFactory>,
    callback: Arc<dyn PlayerCallback>,
}

impl Player {
    pub fn new(factory: Box<dyn BackendFactory>, callback: Arc<dyn PlayerCallback>) -> Self {
        Self {
            playlist: Vec::new(),
            state: PlaybackState::default(),
            backend: None,
            factory,
            callback,
        }
    }

    /// Canonical push from the server
    pub fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.apply();
    }

    /// Full playlist replacement from the server
    pub fn set_playlist(&mut self, playlist: Vec<Video>) {
        self.playlist = playlist;
        self.apply();
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn playlist(&self) -> &[Video] {
        &self.playlist
    }

    /// Forward a normalized embed event to the live backend
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if let Some(backend) = self.backend.as_mut() {
            backend.handle_media_event(event);
        }
    }

    /// The state this session would report to the engine right now; None
    /// until a backend exists
    pub fn report(&self) -> Option<PlaybackState> {
        let backend = self.backend.as_ref()?;
        Some(PlaybackState {
            playing: backend.playing(),
            current_video_id: self.state.current_video_id,
            current_time_ms: backend.current_time_ms(),
        })
    }

    /// Full session teardown; the only way a live backend goes away without a
    /// replacement
    pub fn teardown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.remove();
        }
    }

    fn apply(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.ensure_backend();
        if let Some(backend) = self.backend.as_mut() {
            backend.set_state(&self.playlist, &self.state);
        }
    }

    /// Make the live backend's kind match the current video's provider,
    /// tearing the old one down first so exactly one backend exists at a time
    fn ensure_backend(&mut self) {
        let video = self
            .playlist
            .iter()
            .find(|v| v.id == self.state.current_video_id)
            .or_else(|| self.playlist.first());
        let Some(video) = video else {
            return;
        };
        let kind = BackendKind::for_video(video);
        if self.backend.as_ref().map(|b| b.kind()) != Some(kind) {
            if let Some(mut old) = self.backend.take() {
                old.remove();
            }
            debug!("creating {:?} backend", kind);
            self.backend = Some(self.factory.create(kind, Arc::clone(&self.callback)));
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Records callback invocations for assertions
    #[derive(Default)]
    pub struct RecordingCallback {
        pub state_requests: Mutex<u32>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl PlayerCallback for RecordingCallback {
        fn request_state(&self) {
            *self.state_requests.lock() += 1;
        }

        fn show_prompt(&self, message: &str) {
            self.prompts.lock().push(message.to_string());
        }
    }
}
