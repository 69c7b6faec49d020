//! Collaborator Interfaces
//!
//! Persistent storage of playlists and chat history is outside this crate;
//! the engine only talks to these traits. The in-memory implementations back
//! the server binary and the tests, and make no persistence promises.

use parking_lot::RwLock;
use std::collections::VecDeque;

use crate::sync::{ChatMessage, Video, VideoDraft};

pub trait PlaylistStore: Send + Sync {
    /// The full playlist in playback order
    fn get_playlist(&self) -> Vec<Video>;
    /// Append a draft; the store assigns the id
    fn add_to_playlist(&self, draft: VideoDraft);
}

pub trait MessageStore: Send + Sync {
    /// The most recent messages, oldest first
    fn recent_messages(&self, limit: usize) -> Vec<ChatMessage>;
    fn add_message(&self, message: ChatMessage);
}

/// Retained chat messages beyond which the oldest are dropped
const MESSAGE_CAP: usize = 500;

#[derive(Debug, Default)]
struct PlaylistInner {
    videos: Vec<Video>,
    next_id: u64,
}

#[derive(Debug)]
pub struct InMemoryPlaylist {
    inner: RwLock<PlaylistInner>,
}

impl InMemoryPlaylist {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PlaylistInner {
                videos: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Seed the playlist, continuing id assignment past the seeded entries
    pub fn with_videos(videos: Vec<Video>) -> Self {
        let next_id = videos.iter().map(|v| v.id).max().unwrap_or(0) + 1;
        Self {
            inner: RwLock::new(PlaylistInner { videos, next_id }),
        }
    }
}

impl Default for InMemoryPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistStore for InMemoryPlaylist {
    fn get_playlist(&self) -> Vec<Video> {
        self.inner.read().videos.clone()
    }

    fn add_to_playlist(&self, draft: VideoDraft) {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.videos.push(Video {
            id,
            src: draft.src,
            title: draft.title,
            provider: draft.provider,
            captions: draft.captions,
            duration_ms: draft.duration_ms,
        });
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMessages {
    messages: RwLock<VecDeque<ChatMessage>>,
}

impl InMemoryMessages {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for InMemoryMessages {
    fn recent_messages(&self, limit: usize) -> Vec<ChatMessage> {
        let messages = self.messages.read();
        let skip = messages.len().saturating_sub(limit);
        messages.iter().skip(skip).cloned().collect()
    }

    fn add_message(&self, message: ChatMessage) {
        let mut messages = self.messages.write();
        if messages.len() >= MESSAGE_CAP {
            messages.pop_front();
        }
        messages.push_back(message);
    }
}
