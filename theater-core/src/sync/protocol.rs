//! Sync Protocol Messages

use serde::{Deserialize, Serialize};

/// Embed provider for a playlist entry. `None` on [`Video::provider`] means a
/// native media file served directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Youtube,
    Vimeo,
}

/// One entry in the shared playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: u64,
    /// Provider video id for embeds, or a served path for native files
    pub src: String,
    pub title: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    pub captions: bool,
    pub duration_ms: u64,
}

/// Draft accepted by the playlist collaborator when adding a video; the store
/// assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDraft {
    pub src: String,
    pub title: String,
    pub provider: Option<Provider>,
    pub captions: bool,
    pub duration_ms: u64,
}

/// The playback tuple every client mirrors. The canonical copy lives in the
/// engine; while `playing` is false, `current_time_ms` is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub playing: bool,
    pub current_video_id: u64,
    pub current_time_ms: u64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            playing: false,
            current_video_id: 0,
            current_time_ms: 0,
        }
    }
}

/// A single user action against the canonical state. Exactly one field is
/// meaningful per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", content = "value", rename_all = "camelCase")]
pub enum ChangeRequest {
    Playing(bool),
    Time(u64),
    VideoId(u64),
}

/// Chat identity a client submits with `user_info_set`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub name: String,
    pub avatar_url: String,
    /// Client-declared "resuming an earlier session" flag; suppresses the
    /// join announcement. Not verified server-side.
    #[serde(default)]
    pub resumed: bool,
}

/// An accepted, sanitized identity as the server stores and broadcasts it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatIdentity {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
}

/// A chat message or announcement. Sender fields are absent for
/// announcements. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub is_announcement: bool,
    pub body_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar_url: Option<String>,
}

/// Messages the server pushes to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Post-admission handshake carrying the connection id
    IdSet { id: String },
    /// Full playlist replacement
    PlaylistSet { videos: Vec<Video> },
    /// Canonical state push, broadcast or targeted correction
    StateSet { state: PlaybackState },
    /// Roster of identified audience members
    AudienceInfoSet { members: Vec<ChatIdentity> },
    ChatMessage { message: ChatMessage },
    ChatAnnouncement { body_html: String },
    /// The requester's add-video URL was rejected
    AddVideoFailed,
    /// User-facing toast
    Alert { message: String },
    /// Liveness probe for latency measurement
    Ping { probe_id: u32 },
}

/// Messages clients send to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    StateChangeRequest { request: ChangeRequest },
    /// Periodic self-report feeding the engine's reconcile pass
    StateReport { state: PlaybackState },
    /// Explicit re-pull of canonical state and playlist
    StateUpdateRequest,
    AddVideo { url: String },
    UserInfoSet { info: UserInfo },
    UserInfoClear,
    WroteMessage { body: String },
    /// Liveness probe ack
    Pong { probe_id: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_request_wire_format() {
        let json = serde_json::to_value(ChangeRequest::Playing(true)).unwrap();
        assert_eq!(json, serde_json::json!({"change": "playing", "value": true}));

        let json = serde_json::to_value(ChangeRequest::Time(1500)).unwrap();
        assert_eq!(json, serde_json::json!({"change": "time", "value": 1500}));

        let parsed: ChangeRequest =
            serde_json::from_str(r#"{"change": "videoId", "value": 3}"#).unwrap();
        assert_eq!(parsed, ChangeRequest::VideoId(3));
    }

    #[test]
    fn test_playback_state_uses_camel_case() {
        let state = PlaybackState {
            playing: true,
            current_video_id: 2,
            current_time_ms: 4500,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"playing": true, "currentVideoId": 2, "currentTimeMs": 4500})
        );
    }

    #[test]
    fn test_client_event_tags_match_message_surface() {
        let parsed: ClientEvent = serde_json::from_str(
            r#"{"type": "state_change_request", "request": {"change": "time", "value": 0}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            ClientEvent::StateChangeRequest {
                request: ChangeRequest::Time(0)
            }
        );

        let parsed: ClientEvent = serde_json::from_str(r#"{"type": "state_update_request"}"#).unwrap();
        assert_eq!(parsed, ClientEvent::StateUpdateRequest);
    }

    #[test]
    fn test_announcement_omits_sender_fields() {
        let message = ChatMessage {
            is_announcement: true,
            body_html: "<strong>someone</strong> joined the chat.".to_string(),
            sender_id: None,
            sender_name: None,
            sender_avatar_url: None,
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("senderId"));
        assert!(!json.contains("senderName"));
    }
}
