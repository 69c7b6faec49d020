//! Synchronization Engine
//!
//! The `Theater` owns the canonical playback state and the audience
//! membership set. It runs as a single task draining a command channel, so
//! every mutation runs to completion before the next command is seen and the
//! canonical state never needs a lock. Broadcasts happen synchronously with
//! the mutation that produced them, which keeps their order consistent with
//! the order requests were applied.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::member::{AudienceMember, ClientReport, ConnectionStatus};
use crate::metadata::{MetadataError, MetadataResolver};
use crate::store::{MessageStore, PlaylistStore};
use crate::sync::{
    ChangeRequest, ChatMessage, ClientEvent, PlaybackState, ServerEvent, TimestampedState,
    UserInfo, VideoDraft,
};

/// Drift beyond which a targeted correction is pushed. Network jitter sits
/// around 100-300ms; correcting below this would fight the jitter itself.
pub const DRIFT_CORRECTION_MS: u64 = 1000;

/// Drift beyond which the correction also gets a user-facing alert, since the
/// resulting jump is large enough to confuse
pub const DRIFT_ALERT_MS: u64 = 3000;

/// Consecutive paused-while-playing reports before the autoplay alert fires
pub const AUTOPLAY_STRIKE_LIMIT: u8 = 3;

/// How many recent chat messages a new member gets replayed
pub const CHAT_REPLAY_LIMIT: usize = 20;

/// Queued commands the engine will buffer before producers are backpressured
const COMMAND_BUFFER: usize = 256;

/// Toast shown when a member's browser keeps refusing programmatic playback
const AUTOPLAY_ALERT: &str = "Your browser blocked playback - press play to resume watching.";

/// Toast shown alongside a correction that jumps the member noticeably
const SYNC_JUMP_ALERT: &str = "Syncing you up with everyone else...";

/// Everything the engine reacts to, funneled through one channel
pub enum TheaterCommand {
    /// A transport connection was established
    Connect {
        id: String,
        outbox: UnboundedSender<ServerEvent>,
    },
    /// A transport connection went away
    Disconnect { id: String },
    /// A decoded message from a connected client
    Client { id: String, event: ClientEvent },
    /// The transport's probe timer fired for this connection
    ProbeTick { id: String },
    /// A spawned metadata lookup finished
    VideoResolved {
        id: String,
        result: Result<VideoDraft, MetadataError>,
    },
    /// Diagnostics snapshot request
    Stats {
        reply: oneshot::Sender<Vec<ConnectionStatus>>,
    },
}

pub struct Theater {
    state: TimestampedState,
    audience: HashMap<String, AudienceMember>,
    playlist: Arc<dyn PlaylistStore>,
    messages: Arc<dyn MessageStore>,
    resolver: Arc<dyn MetadataResolver>,
    clock: Arc<dyn Clock>,
    /// Handle for re-enqueueing results of spawned metadata lookups
    commands: Sender<TheaterCommand>,
}

impl Theater {
    /// Build an engine around its collaborators. The returned receiver must
    /// be passed to [`Theater::run`]; clones of [`Theater::handle`] feed it.
    pub fn new(
        playlist: Arc<dyn PlaylistStore>,
        messages: Arc<dyn MessageStore>,
        resolver: Arc<dyn MetadataResolver>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::Receiver<TheaterCommand>) {
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
        let initial = PlaybackState {
            current_video_id: playlist.get_playlist().first().map(|v| v.id).unwrap_or(0),
            ..PlaybackState::default()
        };
        let state = TimestampedState::new(initial, clock.now_ms());
        (
            Self {
                state,
                audience: HashMap::new(),
                playlist,
                messages,
                resolver,
                clock,
                commands,
            },
            inbox,
        )
    }

    pub fn handle(&self) -> Sender<TheaterCommand> {
        self.commands.clone()
    }

    /// Drain commands until every handle is dropped
    pub async fn run(mut self, mut inbox: mpsc::Receiver<TheaterCommand>) {
        while let Some(command) = inbox.recv().await {
            self.dispatch(command);
        }
    }

    /// Handle one command to completion
    pub fn dispatch(&mut self, command: TheaterCommand) {
        let now_ms = self.clock.now_ms();
        match command {
            TheaterCommand::Connect { id, outbox } => self.admit_member(id, outbox, now_ms),
            TheaterCommand::Disconnect { id } => self.remove_member(&id, now_ms),
            TheaterCommand::Client { id, event } => self.handle_client_event(&id, event, now_ms),
            TheaterCommand::ProbeTick { id } => self.probe_tick(&id, now_ms),
            TheaterCommand::VideoResolved { id, result } => self.finish_add_video(&id, result),
            TheaterCommand::Stats { reply } => {
                let _ = reply.send(self.connection_statuses(now_ms));
            }
        }
    }

    /// Effective canonical state at `now_ms`
    pub fn current_state(&self, now_ms: u64) -> PlaybackState {
        self.state.effective(now_ms)
    }

    /// Register a new member and bring it up to date: its id, the full
    /// playlist, the current effective state, and the recent chat history
    /// (replayed to it alone).
    pub fn admit_member(
        &mut self,
        id: String,
        outbox: UnboundedSender<ServerEvent>,
        now_ms: u64,
    ) {
        let member = AudienceMember::new(id.clone(), outbox, now_ms);
        member.send(ServerEvent::IdSet { id: id.clone() });
        member.send(ServerEvent::PlaylistSet {
            videos: self.playlist.get_playlist(),
        });
        member.send(ServerEvent::StateSet {
            state: self.state.effective(now_ms),
        });
        for message in self.messages.recent_messages(CHAT_REPLAY_LIMIT) {
            member.send(if message.is_announcement {
                ServerEvent::ChatAnnouncement {
                    body_html: message.body_html,
                }
            } else {
                ServerEvent::ChatMessage { message }
            });
        }
        self.audience.insert(id, member);
        info!("new audience member: {} total connected", self.audience.len());
    }

    /// Drop a member. An emptied room pauses playback at the current
    /// effective position so the next joiner resumes exactly there.
    pub fn remove_member(&mut self, id: &str, now_ms: u64) {
        let Some(member) = self.audience.remove(id) else {
            return;
        };
        let was_identified = member.identity().is_some();
        info!("audience member left: {} remaining", self.audience.len());
        if was_identified {
            self.broadcast_roster();
        }
        if self.audience.is_empty() {
            debug!("pausing playback as no one is left to watch");
            self.state.freeze(now_ms);
        }
    }

    fn handle_client_event(&mut self, id: &str, event: ClientEvent, now_ms: u64) {
        match event {
            ClientEvent::StateChangeRequest { request } => {
                self.apply_change_request(request, now_ms)
            }
            ClientEvent::StateReport { state } => self.reconcile(id, state, now_ms),
            ClientEvent::StateUpdateRequest => self.resend_state(id, now_ms),
            ClientEvent::AddVideo { url } => self.begin_add_video(id, url),
            ClientEvent::UserInfoSet { info } => self.set_user_info(id, info),
            ClientEvent::UserInfoClear => self.clear_user_info(id),
            ClientEvent::WroteMessage { body } => self.handle_chat_message(id, body),
            ClientEvent::Pong { probe_id } => {
                if let Some(member) = self.audience.get_mut(id) {
                    member.latency.complete_probe(probe_id, now_ms);
                }
            }
        }
    }

    /// Apply one change request to the canonical state and broadcast the new
    /// literal state to every member. No request is rejected for content
    /// reasons; a video id outside the playlist is dropped with a log only.
    pub fn apply_change_request(&mut self, request: ChangeRequest, now_ms: u64) {
        let mut next = self.state.effective(now_ms);
        match request {
            ChangeRequest::Playing(playing) => next.playing = playing,
            // Seeking always pauses, so a seek never races concurrent
            // playback advance
            ChangeRequest::Time(ms) => {
                next.playing = false;
                next.current_time_ms = ms;
            }
            ChangeRequest::VideoId(id) => {
                if !self.playlist.get_playlist().iter().any(|v| v.id == id) {
                    warn!("dropping change request for unknown video id {}", id);
                    return;
                }
                next = PlaybackState {
                    playing: false,
                    current_video_id: id,
                    current_time_ms: 0,
                };
            }
        }
        self.state.replace(next, now_ms);
        debug!("applied {:?}; broadcasting new state", request);
        self.broadcast(ServerEvent::StateSet { state: next });
    }

    /// Compare a member's self-reported state against the canonical one and
    /// push a targeted correction when they diverge. Priority-ordered: a
    /// wrong video dominates a play/pause mismatch, which dominates drift;
    /// only the first matching rule acts per cycle.
    pub fn reconcile(&mut self, id: &str, reported: PlaybackState, now_ms: u64) {
        let canonical = self.state.effective(now_ms);
        let Some(member) = self.audience.get_mut(id) else {
            return;
        };
        member.last_report = Some(ClientReport {
            state: reported,
            received_at_ms: now_ms,
        });

        if reported.current_video_id != canonical.current_video_id {
            debug!("correcting {}: wrong video", id);
            member.send(ServerEvent::StateSet { state: canonical });
            return;
        }

        if reported.playing != canonical.playing {
            member.send(ServerEvent::StateSet { state: canonical });
            if canonical.playing && !reported.playing {
                // A member that stays paused while the room plays is usually
                // stuck behind an autoplay policy; programmatic corrections
                // keep silently failing, so ask for a gesture.
                member.autoplay_strikes += 1;
                debug!(
                    "correcting {}: paused while room is playing (strike {})",
                    id, member.autoplay_strikes
                );
                if member.autoplay_strikes >= AUTOPLAY_STRIKE_LIMIT {
                    member.send(ServerEvent::Alert {
                        message: AUTOPLAY_ALERT.to_string(),
                    });
                    member.autoplay_strikes = 0;
                }
            } else {
                member.autoplay_strikes = 0;
            }
            return;
        }

        member.autoplay_strikes = 0;
        let drift = reported.current_time_ms.abs_diff(canonical.current_time_ms);
        if drift > DRIFT_CORRECTION_MS {
            debug!("correcting {}: {}ms of drift", id, drift);
            member.send(ServerEvent::StateSet { state: canonical });
            if drift > DRIFT_ALERT_MS {
                member.send(ServerEvent::Alert {
                    message: SYNC_JUMP_ALERT.to_string(),
                });
            }
        }
    }

    /// Answer an explicit re-pull with fresh state and playlist, to the
    /// requesting member alone
    fn resend_state(&self, id: &str, now_ms: u64) {
        let Some(member) = self.audience.get(id) else {
            return;
        };
        member.send(ServerEvent::StateSet {
            state: self.state.effective(now_ms),
        });
        member.send(ServerEvent::PlaylistSet {
            videos: self.playlist.get_playlist(),
        });
    }

    fn probe_tick(&mut self, id: &str, now_ms: u64) {
        let Some(member) = self.audience.get_mut(id) else {
            return;
        };
        let probe_id = member.latency.begin_probe(now_ms);
        member.send(ServerEvent::Ping { probe_id });
    }

    fn set_user_info(&mut self, id: &str, info: UserInfo) {
        let Some(member) = self.audience.get_mut(id) else {
            return;
        };
        if !member.set_identity(&info) {
            return;
        }
        let name = member
            .identity()
            .map(|identity| identity.name.clone())
            .unwrap_or_default();
        if !info.resumed {
            self.broadcast_chat(ChatMessage {
                is_announcement: true,
                body_html: format!("<strong>{}</strong> joined the chat.", name),
                sender_id: None,
                sender_name: None,
                sender_avatar_url: None,
            });
        }
        self.broadcast_roster();
    }

    fn clear_user_info(&mut self, id: &str) {
        let Some(member) = self.audience.get_mut(id) else {
            return;
        };
        member.clear_identity();
        self.broadcast_roster();
    }

    fn handle_chat_message(&mut self, id: &str, body: String) {
        let Some(member) = self.audience.get(id) else {
            return;
        };
        let Some(identity) = member.identity() else {
            debug!("dropping chat message from anonymous connection {}", id);
            return;
        };
        let message = ChatMessage {
            is_announcement: false,
            body_html: html_escape::encode_text(&body).into_owned(),
            sender_id: Some(identity.id.clone()),
            sender_name: Some(identity.name.clone()),
            sender_avatar_url: Some(identity.avatar_url.clone()),
        };
        self.broadcast_chat(message);
    }

    /// Persist a message via the collaborator and fan it out to everyone
    pub fn broadcast_chat(&self, message: ChatMessage) {
        self.messages.add_message(message.clone());
        if message.is_announcement {
            debug!("emitting chat announcement: {}", message.body_html);
            self.broadcast(ServerEvent::ChatAnnouncement {
                body_html: message.body_html,
            });
        } else {
            self.broadcast(ServerEvent::ChatMessage { message });
        }
    }

    /// Fan the current playlist out to everyone. Called after an add
    /// completes, and exposed for collaborators that change the playlist
    /// through other paths (uploads).
    pub fn playlist_changed(&self) {
        self.broadcast(ServerEvent::PlaylistSet {
            videos: self.playlist.get_playlist(),
        });
    }

    /// Kick off a metadata lookup without holding up the command loop; the
    /// result is re-enqueued as a command. Playback state is never touched
    /// while the lookup is in flight.
    fn begin_add_video(&self, id: &str, url: String) {
        debug!("attempting to add video from {}", url);
        let resolver = Arc::clone(&self.resolver);
        let commands = self.commands.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = resolver.resolve(&url).await;
            let _ = commands.send(TheaterCommand::VideoResolved { id, result }).await;
        });
    }

    fn finish_add_video(&mut self, id: &str, result: Result<VideoDraft, MetadataError>) {
        match result {
            Ok(draft) => {
                self.playlist.add_to_playlist(draft);
                self.playlist_changed();
            }
            Err(error) => {
                warn!("could not add video: {}", error);
                if let Some(member) = self.audience.get(id) {
                    member.send(ServerEvent::AddVideoFailed);
                }
            }
        }
    }

    /// Diagnostics snapshot for every connection
    pub fn connection_statuses(&self, now_ms: u64) -> Vec<ConnectionStatus> {
        self.audience
            .values()
            .map(|member| member.connection_status(now_ms))
            .collect()
    }

    fn broadcast_roster(&self) {
        let members = self
            .audience
            .values()
            .filter_map(|member| member.identity().cloned())
            .collect();
        self.broadcast(ServerEvent::AudienceInfoSet { members });
    }

    /// A send to a dead connection is swallowed; its cleanup arrives as a
    /// Disconnect command from the transport layer.
    fn broadcast(&self, event: ServerEvent) {
        for member in self.audience.values() {
            member.send(event.clone());
        }
    }
}
