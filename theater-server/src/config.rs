//! Environment-driven configuration

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on (`THEATER_PORT`)
    pub port: u16,
    /// Optional JSON playlist seed file (`THEATER_PLAYLIST`)
    pub playlist_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("THEATER_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let playlist_path = std::env::var("THEATER_PLAYLIST").ok().map(PathBuf::from);
        Self {
            port,
            playlist_path,
        }
    }
}
