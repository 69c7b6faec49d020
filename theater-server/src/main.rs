//! Theater - synchronized watch-together server
//!
//! Builds the synchronization engine around its collaborators, binds it to a
//! WebSocket transport, and serves the diagnostics endpoint.

mod config;
mod stats;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use theater_core::clock::SystemClock;
use theater_core::metadata::{MetadataResolver, OEmbedClient};
use theater_core::store::{InMemoryMessages, InMemoryPlaylist, MessageStore, PlaylistStore};
use theater_core::sync::Video;
use theater_core::Theater;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "theater_server=debug,theater_core=debug".into()),
        )
        .init();

    let config = Config::from_env();
    let playlist: Arc<dyn PlaylistStore> = Arc::new(load_playlist(&config));
    let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessages::new());
    let resolver: Arc<dyn MetadataResolver> = Arc::new(OEmbedClient::new());

    let (theater, inbox) = Theater::new(playlist, messages, resolver, Arc::new(SystemClock));
    let handle = theater.handle();
    tokio::spawn(theater.run(inbox));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/stats", get(stats::stats_handler))
        .with_state(handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Seed the playlist from the configured JSON file, or start empty
fn load_playlist(config: &Config) -> InMemoryPlaylist {
    let Some(path) = &config.playlist_path else {
        return InMemoryPlaylist::new();
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Vec<Video>>(&contents) {
            Ok(videos) => {
                info!("seeded {} videos from {}", videos.len(), path.display());
                InMemoryPlaylist::with_videos(videos)
            }
            Err(error) => {
                warn!("could not parse {}: {}", path.display(), error);
                InMemoryPlaylist::new()
            }
        },
        Err(error) => {
            warn!("could not read {}: {}", path.display(), error);
            InMemoryPlaylist::new()
        }
    }
}
