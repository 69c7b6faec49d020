//! Audience Member Proxy
//!
//! Wraps one transport connection: its outbox, its latency samples, its
//! self-reported chat identity, and the last playback report it sent. Members
//! are owned exclusively by the engine's membership set and live from
//! connection-establish to disconnect.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::latency::LatencySampler;
use crate::sync::{ChatIdentity, PlaybackState, ServerEvent, UserInfo};

/// Avatar URLs must live under this path to be accepted
const AVATAR_PATH_PREFIX: &str = "/images/avatars/";

/// Display names must be shorter than this after trimming
const MAX_NAME_LEN: usize = 30;

/// The last playback state a client reported, and when it arrived
#[derive(Debug, Clone, Copy)]
pub struct ClientReport {
    pub state: PlaybackState,
    pub received_at_ms: u64,
}

/// Diagnostic snapshot served by the stats endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub chat_name: String,
    pub uptime_ms: u64,
    pub latest_ping: Option<u64>,
    pub avg_ping: Option<f64>,
    pub ping_histogram: (Vec<u32>, Vec<String>),
    pub player_state: Option<PlaybackState>,
}

pub struct AudienceMember {
    pub id: String,
    outbox: UnboundedSender<ServerEvent>,
    pub latency: LatencySampler,
    identity: Option<ChatIdentity>,
    pub last_report: Option<ClientReport>,
    connected_at_ms: u64,
    // managed by the Theater's reconcile pass
    pub autoplay_strikes: u8,
}

impl AudienceMember {
    pub fn new(id: String, outbox: UnboundedSender<ServerEvent>, now_ms: u64) -> Self {
        Self {
            id,
            outbox,
            latency: LatencySampler::new(),
            identity: None,
            last_report: None,
            connected_at_ms: now_ms,
            autoplay_strikes: 0,
        }
    }

    /// Queue an event for this member. A dead connection makes the send fail;
    /// that is the transport layer's cleanup to run, not ours.
    pub fn send(&self, event: ServerEvent) {
        let _ = self.outbox.send(event);
    }

    pub fn identity(&self) -> Option<&ChatIdentity> {
        self.identity.as_ref()
    }

    /// Validate and store a submitted identity. The name is trimmed, length
    /// checked, and HTML-escaped; the avatar must come from the allow-listed
    /// path. Returns false when the submission is rejected.
    pub fn set_identity(&mut self, info: &UserInfo) -> bool {
        let name = info.name.trim();
        if !info.avatar_url.starts_with(AVATAR_PATH_PREFIX) || name.len() >= MAX_NAME_LEN {
            debug!(
                "rejecting chat identity from {}: {:?} / {:?}",
                self.id, name, info.avatar_url
            );
            return false;
        }
        self.identity = Some(ChatIdentity {
            id: self.id.clone(),
            name: html_escape::encode_text(name).into_owned(),
            avatar_url: info.avatar_url.clone(),
        });
        debug!("audience member {} set their chat identity", self.id);
        true
    }

    pub fn clear_identity(&mut self) {
        self.identity = None;
    }

    pub fn uptime_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.connected_at_ms)
    }

    pub fn connection_status(&self, now_ms: u64) -> ConnectionStatus {
        ConnectionStatus {
            chat_name: self
                .identity
                .as_ref()
                .map(|i| i.name.clone())
                .unwrap_or_default(),
            uptime_ms: self.uptime_ms(now_ms),
            latest_ping: self.latency.last_sample(),
            avg_ping: self.latency.mean(),
            ping_histogram: self.latency.histogram(),
            player_state: self.last_report.map(|r| r.state),
        }
    }
}
