//! Sync Engine Surface
//!
//! Wire protocol messages and the canonical, timestamped playback state.

mod protocol;
mod state;

pub use protocol::*;
pub use state::*;
