//! Canonical Playback State
//!
//! The engine stores the playback tuple together with the wall-clock instant
//! it was last written. Reading the state extrapolates the position by the
//! elapsed time instead of running a timer, so the stored value only changes
//! when a request is applied.

use super::protocol::PlaybackState;

/// Canonical state plus the wall-clock millisecond it was last set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedState {
    state: PlaybackState,
    as_of_ms: u64,
}

impl TimestampedState {
    pub fn new(state: PlaybackState, now_ms: u64) -> Self {
        Self {
            state,
            as_of_ms: now_ms,
        }
    }

    /// The stored literal state, without extrapolation
    pub fn base(&self) -> PlaybackState {
        self.state
    }

    /// Effective state at `now_ms`: while playing, the position advances with
    /// elapsed wall-clock time; while paused it stays frozen.
    pub fn effective(&self, now_ms: u64) -> PlaybackState {
        let mut state = self.state;
        if state.playing {
            state.current_time_ms += now_ms.saturating_sub(self.as_of_ms);
        }
        state
    }

    /// Overwrite the stored state and re-stamp it
    pub fn replace(&mut self, state: PlaybackState, now_ms: u64) {
        self.state = state;
        self.as_of_ms = now_ms;
    }

    /// Pause at the current effective position
    pub fn freeze(&mut self, now_ms: u64) {
        let mut state = self.effective(now_ms);
        state.playing = false;
        self.replace(state, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_at(current_time_ms: u64, as_of_ms: u64) -> TimestampedState {
        TimestampedState::new(
            PlaybackState {
                playing: true,
                current_video_id: 1,
                current_time_ms,
            },
            as_of_ms,
        )
    }

    #[test]
    fn test_effective_advances_while_playing() {
        let state = playing_at(5000, 1_000_000);
        assert_eq!(state.effective(1_001_000).current_time_ms, 6000);
    }

    #[test]
    fn test_effective_frozen_while_paused() {
        let mut state = playing_at(5000, 1_000_000);
        state.replace(
            PlaybackState {
                playing: false,
                current_video_id: 1,
                current_time_ms: 5000,
            },
            1_000_000,
        );
        assert_eq!(state.effective(1_060_000).current_time_ms, 5000);
    }

    #[test]
    fn test_freeze_captures_effective_position() {
        let mut state = playing_at(5000, 1_000_000);
        state.freeze(1_002_500);
        let frozen = state.base();
        assert!(!frozen.playing);
        assert_eq!(frozen.current_time_ms, 7500);
        // Frozen state no longer advances
        assert_eq!(state.effective(1_010_000).current_time_ms, 7500);
    }

    #[test]
    fn test_effective_tolerates_clock_regression() {
        let state = playing_at(5000, 1_000_000);
        assert_eq!(state.effective(999_000).current_time_ms, 5000);
    }
}
