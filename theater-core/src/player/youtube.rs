//! YouTube Embed Backend
//!
//! The iframe player cues videos by id rather than loading a source, reports
//! a coarse player state, and queues commands behind its own readiness
//! handshake. All of that stays behind [`YoutubeEmbed`]; the backend only
//! translates canonical state into the embed's command language.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::sync::{PlaybackState, Video};

use super::backend::{BackendKind, MediaEvent, VideoBackend, SEEK_THRESHOLD_MS};
use super::{PlaybackRejected, PlayerCallback, AUTOPLAY_PROMPT};

/// States the iframe API reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoutubePlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// Control surface of the YouTube iframe player
pub trait YoutubeEmbed: Send {
    fn cue_video(&mut self, video_id: &str);
    fn current_time_ms(&self) -> u64;
    fn seek_ms(&mut self, position_ms: u64);
    fn duration_ms(&self) -> u64;
    fn play_video(&mut self) -> Result<(), PlaybackRejected>;
    fn pause_video(&mut self);
    fn player_state(&self) -> YoutubePlayerState;
    fn destroy(&mut self);
}

pub struct YoutubeBackend {
    embed: Box<dyn YoutubeEmbed>,
    callback: Arc<dyn PlayerCallback>,
    prev_src: String,
}

impl YoutubeBackend {
    pub fn new(embed: Box<dyn YoutubeEmbed>, callback: Arc<dyn PlayerCallback>) -> Self {
        Self {
            embed,
            callback,
            prev_src: String::new(),
        }
    }
}

impl VideoBackend for YoutubeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Youtube
    }

    fn current_time_ms(&self) -> u64 {
        self.embed.current_time_ms()
    }

    fn duration_ms(&self) -> u64 {
        self.embed.duration_ms()
    }

    fn playing(&self) -> bool {
        self.embed.player_state() == YoutubePlayerState::Playing
    }

    fn set_state(&mut self, playlist: &[Video], state: &PlaybackState) {
        let Some(video) = playlist.iter().find(|v| v.id == state.current_video_id) else {
            warn!("state references video {} missing from playlist", state.current_video_id);
            return;
        };
        if video.src != self.prev_src {
            debug!("cueing youtube video {}", video.src);
            self.embed.cue_video(&video.src);
            self.prev_src = video.src.clone();
        }
        if self
            .embed
            .current_time_ms()
            .abs_diff(state.current_time_ms)
            > SEEK_THRESHOLD_MS
        {
            self.embed.seek_ms(state.current_time_ms);
        }
        let player_state = self.embed.player_state();
        if state.playing && player_state != YoutubePlayerState::Playing {
            if self.embed.play_video().is_err() {
                debug!("autoplay rejected; prompting for a gesture");
                self.callback.show_prompt(AUTOPLAY_PROMPT);
            }
        } else if !state.playing && player_state == YoutubePlayerState::Playing {
            self.embed.pause_video();
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        // The embed falls behind while buffering and lands paused after
        // cueing; both times the fresh canonical state pulls it back
        if matches!(event, MediaEvent::Playing | MediaEvent::Cued) {
            self.callback.request_state();
        }
    }

    fn remove(&mut self) {
        self.embed.destroy();
    }
}
