//! Native Media Element Backend
//!
//! Drives a plain `<video>` element: sources load directly, seeks are exact,
//! and `play()` can be rejected outright by the browser's autoplay policy.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::sync::{PlaybackState, Video};

use super::backend::{BackendKind, MediaEvent, VideoBackend, SEEK_THRESHOLD_MS};
use super::{PlaybackRejected, PlayerCallback, AUTOPLAY_PROMPT};

/// Control surface of the native media element. The DOM side lives outside
/// this crate; tests drive a scripted stand-in.
pub trait MediaElement: Send {
    fn set_source(&mut self, src: &str);
    fn current_time_ms(&self) -> u64;
    fn seek_ms(&mut self, position_ms: u64);
    fn duration_ms(&self) -> u64;
    fn play(&mut self) -> Result<(), PlaybackRejected>;
    fn pause(&mut self);
    fn paused(&self) -> bool;
    fn detach(&mut self);
}

pub struct NativeBackend {
    element: Box<dyn MediaElement>,
    callback: Arc<dyn PlayerCallback>,
    prev_src: String,
}

impl NativeBackend {
    pub fn new(element: Box<dyn MediaElement>, callback: Arc<dyn PlayerCallback>) -> Self {
        Self {
            element,
            callback,
            prev_src: String::new(),
        }
    }
}

impl VideoBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn current_time_ms(&self) -> u64 {
        self.element.current_time_ms()
    }

    fn duration_ms(&self) -> u64 {
        self.element.duration_ms()
    }

    fn playing(&self) -> bool {
        !self.element.paused()
    }

    fn set_state(&mut self, playlist: &[Video], state: &PlaybackState) {
        let Some(video) = playlist.iter().find(|v| v.id == state.current_video_id) else {
            warn!("state references video {} missing from playlist", state.current_video_id);
            return;
        };
        if video.src != self.prev_src {
            debug!("changing <video> src to {}", video.src);
            self.element.set_source(&video.src);
            self.prev_src = video.src.clone();
        }
        if self
            .element
            .current_time_ms()
            .abs_diff(state.current_time_ms)
            > SEEK_THRESHOLD_MS
        {
            self.element.seek_ms(state.current_time_ms);
        }
        if state.playing && self.element.paused() {
            if self.element.play().is_err() {
                debug!("autoplay rejected; prompting for a gesture");
                self.callback.show_prompt(AUTOPLAY_PROMPT);
            }
        } else if !state.playing {
            self.element.pause();
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        // Ready to play again after buffering; catch up with the server
        if event == MediaEvent::Playing {
            self.callback.request_state();
        }
    }

    fn remove(&mut self) {
        self.element.detach();
    }
}


#[cfg(test)]
mod tests {
    use super::element_test_support::{ElementProbe, ScriptedElement};
    use super::*;
    use crate::player::test_support::RecordingCallback;
    use crate::sync::Video;

    fn video(id: u64, src: &str) -> Video {
        Video {
            id,
            src: src.to_string(),
            title: src.to_string(),
            provider: None,
            captions: true,
            duration_ms: 600_000,
        }
    }

    fn state(playing: bool, video_id: u64, time_ms: u64) -> PlaybackState {
        PlaybackState {
            playing,
            current_video_id: video_id,
            current_time_ms: time_ms,
        }
    }

    fn backend(
        position_ms: u64,
        reject_play: bool,
    ) -> (NativeBackend, Arc<RecordingCallback>, Arc<ElementProbe>) {
        let (element, probe) = ScriptedElement::new(position_ms, reject_play);
        let callback = Arc::new(RecordingCallback::default());
        (
            NativeBackend::new(
                Box::new(element),
                Arc::clone(&callback) as Arc<dyn PlayerCallback>,
            ),
            callback,
            probe,
        )
    }

    #[test]
    fn test_source_loaded_once() {
        let (mut backend, _callback, probe) = backend(0, false);
        let playlist = vec![video(1, "intro.mp4")];
        backend.set_state(&playlist, &state(false, 1, 0));
        backend.set_state(&playlist, &state(false, 1, 500));
        assert_eq!(
            probe
                .calls()
                .iter()
                .filter(|c| c.starts_with("set_source"))
                .count(),
            1
        );
    }

    #[test]
    fn test_seek_only_beyond_threshold() {
        let (mut backend, _callback, probe) = backend(10_000, false);
        let playlist = vec![video(1, "intro.mp4")];
        // 800ms off: left alone
        backend.set_state(&playlist, &state(false, 1, 10_800));
        assert!(!probe.calls().iter().any(|c| c.starts_with("seek")));
        // 1500ms off: corrected
        backend.set_state(&playlist, &state(false, 1, 11_500));
        assert!(probe.calls().contains(&"seek:11500".to_string()));
    }

    #[test]
    fn test_autoplay_rejection_surfaces_prompt() {
        let (mut backend, callback, _probe) = backend(0, true);
        let playlist = vec![video(1, "intro.mp4")];
        backend.set_state(&playlist, &state(true, 1, 0));
        assert_eq!(
            callback.prompts.lock().as_slice(),
            [AUTOPLAY_PROMPT.to_string()]
        );
        assert!(!backend.playing());
    }

    #[test]
    fn test_playing_event_requests_state() {
        let (mut backend, callback, _probe) = backend(0, false);
        backend.handle_media_event(MediaEvent::Playing);
        backend.handle_media_event(MediaEvent::Paused);
        assert_eq!(*callback.state_requests.lock(), 1);
    }

    #[test]
    fn test_remove_detaches_element() {
        let (mut backend, _callback, probe) = backend(0, false);
        backend.remove();
        assert!(probe.calls().contains(&"detach".to_string()));
    }
}
