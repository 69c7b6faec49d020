//! Vimeo Embed Backend
//!
//! The Vimeo player loads videos by numeric id and only reports its duration
//! through events, so the backend caches the last reported value.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::sync::{PlaybackState, Video};

use super::backend::{BackendKind, MediaEvent, VideoBackend, SEEK_THRESHOLD_MS};
use super::{PlaybackRejected, PlayerCallback, AUTOPLAY_PROMPT};

/// Control surface of the Vimeo embed player
pub trait VimeoEmbed: Send {
    fn load_video(&mut self, video_id: &str);
    fn current_time_ms(&self) -> u64;
    fn seek_ms(&mut self, position_ms: u64);
    fn play(&mut self) -> Result<(), PlaybackRejected>;
    fn pause(&mut self);
    fn paused(&self) -> bool;
    fn destroy(&mut self);
}

pub struct VimeoBackend {
    embed: Box<dyn VimeoEmbed>,
    callback: Arc<dyn PlayerCallback>,
    prev_src: String,
    cached_duration_ms: u64,
}

impl VimeoBackend {
    pub fn new(embed: Box<dyn VimeoEmbed>, callback: Arc<dyn PlayerCallback>) -> Self {
        Self {
            embed,
            callback,
            prev_src: String::new(),
            cached_duration_ms: 0,
        }
    }
}

impl VideoBackend for VimeoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vimeo
    }

    fn current_time_ms(&self) -> u64 {
        self.embed.current_time_ms()
    }

    fn duration_ms(&self) -> u64 {
        self.cached_duration_ms
    }

    fn playing(&self) -> bool {
        !self.embed.paused()
    }

    fn set_state(&mut self, playlist: &[Video], state: &PlaybackState) {
        let Some(video) = playlist.iter().find(|v| v.id == state.current_video_id) else {
            warn!("state references video {} missing from playlist", state.current_video_id);
            return;
        };
        if video.src != self.prev_src {
            debug!("loading vimeo video {}", video.src);
            self.embed.load_video(&video.src);
            self.prev_src = video.src.clone();
            self.cached_duration_ms = 0;
        }
        if self
            .embed
            .current_time_ms()
            .abs_diff(state.current_time_ms)
            > SEEK_THRESHOLD_MS
        {
            self.embed.seek_ms(state.current_time_ms);
        }
        if state.playing && self.embed.paused() {
            if self.embed.play().is_err() {
                debug!("autoplay rejected; prompting for a gesture");
                self.callback.show_prompt(AUTOPLAY_PROMPT);
            }
        } else if !state.playing && !self.embed.paused() {
            self.embed.pause();
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Playing => self.callback.request_state(),
            MediaEvent::DurationChanged(duration_ms) => {
                self.cached_duration_ms = duration_ms;
            }
            _ => {}
        }
    }

    fn remove(&mut self) {
        self.embed.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::test_support::RecordingCallback;
    use crate::sync::{Provider, Video};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct EmbedProbe {
        calls: Mutex<Vec<String>>,
        position_ms: AtomicU64,
        is_paused: AtomicBool,
    }

    struct ScriptedEmbed {
        probe: Arc<EmbedProbe>,
    }

    impl VimeoEmbed for ScriptedEmbed {
        fn load_video(&mut self, video_id: &str) {
            self.probe.calls.lock().push(format!("load:{video_id}"));
        }

        fn current_time_ms(&self) -> u64 {
            self.probe.position_ms.load(Ordering::SeqCst)
        }

        fn seek_ms(&mut self, position_ms: u64) {
            self.probe.calls.lock().push(format!("seek:{position_ms}"));
            self.probe.position_ms.store(position_ms, Ordering::SeqCst);
        }

        fn play(&mut self) -> Result<(), PlaybackRejected> {
            self.probe.calls.lock().push("play".to_string());
            self.probe.is_paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&mut self) {
            self.probe.calls.lock().push("pause".to_string());
            self.probe.is_paused.store(true, Ordering::SeqCst);
        }

        fn paused(&self) -> bool {
            self.probe.is_paused.load(Ordering::SeqCst)
        }

        fn destroy(&mut self) {
            self.probe.calls.lock().push("destroy".to_string());
        }
    }

    fn backend() -> (VimeoBackend, Arc<RecordingCallback>, Arc<EmbedProbe>) {
        let probe = Arc::new(EmbedProbe::default());
        probe.is_paused.store(true, Ordering::SeqCst);
        let embed = ScriptedEmbed {
            probe: Arc::clone(&probe),
        };
        let callback = Arc::new(RecordingCallback::default());
        (
            VimeoBackend::new(
                Box::new(embed),
                Arc::clone(&callback) as Arc<dyn PlayerCallback>,
            ),
            callback,
            probe,
        )
    }

    fn playlist() -> Vec<Video> {
        vec![Video {
            id: 3,
            src: "76979871".to_string(),
            title: "embed".to_string(),
            provider: Some(Provider::Vimeo),
            captions: true,
            duration_ms: 0,
        }]
    }

    fn state(playing: bool, time_ms: u64) -> PlaybackState {
        PlaybackState {
            playing,
            current_video_id: 3,
            current_time_ms: time_ms,
        }
    }

    #[test]
    fn test_loads_by_id_once() {
        let (mut backend, _callback, probe) = backend();
        backend.set_state(&playlist(), &state(false, 0));
        backend.set_state(&playlist(), &state(false, 300));
        assert_eq!(
            probe
                .calls
                .lock()
                .iter()
                .filter(|c| c.starts_with("load"))
                .count(),
            1
        );
    }

    #[test]
    fn test_duration_cached_from_events() {
        let (mut backend, _callback, _probe) = backend();
        assert_eq!(backend.duration_ms(), 0);
        backend.handle_media_event(MediaEvent::DurationChanged(90_000));
        assert_eq!(backend.duration_ms(), 90_000);
        // A source swap invalidates the cache
        backend.set_state(&playlist(), &state(false, 0));
        assert_eq!(backend.duration_ms(), 0);
    }

    #[test]
    fn test_play_pause_reconciled() {
        let (mut backend, _callback, probe) = backend();
        backend.set_state(&playlist(), &state(true, 0));
        assert!(probe.calls.lock().contains(&"play".to_string()));
        backend.set_state(&playlist(), &state(false, 0));
        assert!(probe.calls.lock().contains(&"pause".to_string()));
    }

    #[test]
    fn test_playing_event_requests_state() {
        let (mut backend, callback, _probe) = backend();
        backend.handle_media_event(MediaEvent::Playing);
        assert_eq!(*callback.state_requests.lock(), 1);
    }
}
