//! Video Metadata Lookup
//!
//! Resolves a user-submitted URL into a playlist draft via the provider's
//! oEmbed endpoint. The engine only sees the [`MetadataResolver`] trait; the
//! HTTP client lives here so lookups never touch playback state.

mod client;

pub use client::{MetadataError, MetadataResolver, OEmbedClient};
