//! Theater - synchronized watch-together playback
//!
//! This library provides the core functionality for keeping a group of remote
//! viewers on the same video at the same position. The server-side `Theater`
//! engine owns the canonical playback state, one `AudienceMember` proxy
//! mirrors each connection, and the client-side `Player` reconciles
//! heterogeneous video embeds against the state the server pushes.

pub mod clock;
pub mod latency;
pub mod member;
pub mod metadata;
pub mod player;
pub mod store;
pub mod sync;
pub mod theater;

// Re-exports for convenience
pub use clock::{Clock, SystemClock};
pub use sync::{ChangeRequest, ChatMessage, ClientEvent, PlaybackState, Provider, ServerEvent, Video};
pub use theater::{Theater, TheaterCommand};
