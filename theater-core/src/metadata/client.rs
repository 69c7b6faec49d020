//! oEmbed HTTP Client

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::sync::{Provider, VideoDraft};

/// Request timeout for provider oEmbed endpoints
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while resolving a submitted URL
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("url was not a youtube or vimeo url: {0}")]
    UnrecognizedProvider(String),

    #[error("could not extract a video id from {0}")]
    MissingVideoId(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Resolves a submitted URL into a playlist draft
pub trait MetadataResolver: Send + Sync {
    fn resolve<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<VideoDraft, MetadataError>>;
}

/// Fields we read out of a provider's oEmbed response
#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    /// Vimeo reports the duration in seconds; YouTube omits it
    #[serde(default)]
    duration: Option<f64>,
}

/// Client for the YouTube and Vimeo oEmbed endpoints
#[derive(Debug, Clone)]
pub struct OEmbedClient {
    http: Client,
}

impl OEmbedClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }

    async fn fetch(&self, endpoint: &str) -> Result<OEmbedResponse, MetadataError> {
        debug!("fetching oembed data from {}", endpoint);
        let response = self.http.get(endpoint).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

impl Default for OEmbedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataResolver for OEmbedClient {
    fn resolve<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<VideoDraft, MetadataError>> {
        async move {
            let parsed = Url::parse(url)?;
            match classify(&parsed) {
                Some(Provider::Youtube) => {
                    let video_id = youtube_video_id(&parsed)
                        .ok_or_else(|| MetadataError::MissingVideoId(url.to_string()))?;
                    let endpoint =
                        format!("https://youtube.com/oembed?url={}&format=json", parsed);
                    let data = self.fetch(&endpoint).await?;
                    Ok(VideoDraft {
                        src: video_id,
                        title: data.title,
                        provider: Some(Provider::Youtube),
                        captions: true,
                        duration_ms: 0,
                    })
                }
                Some(Provider::Vimeo) => {
                    let video_id = vimeo_video_id(&parsed)
                        .ok_or_else(|| MetadataError::MissingVideoId(url.to_string()))?;
                    let endpoint =
                        format!("https://vimeo.com/api/oembed.json?url={}", parsed);
                    let data = self.fetch(&endpoint).await?;
                    Ok(VideoDraft {
                        src: video_id,
                        title: data.title,
                        provider: Some(Provider::Vimeo),
                        captions: true,
                        duration_ms: data
                            .duration
                            .map(|seconds| (seconds * 1000.0) as u64)
                            .unwrap_or(0),
                    })
                }
                None => Err(MetadataError::UnrecognizedProvider(url.to_string())),
            }
        }
        .boxed()
    }
}

/// Which provider hosts this URL, if any
fn classify(url: &Url) -> Option<Provider> {
    let host = url.host_str()?.to_lowercase();
    if host.ends_with("youtube.com") || host == "youtu.be" {
        Some(Provider::Youtube)
    } else if host.ends_with("vimeo.com") {
        Some(Provider::Vimeo)
    } else {
        None
    }
}

/// Extract the video id from the watch-page URL shapes YouTube uses
fn youtube_video_id(url: &Url) -> Option<String> {
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        return Some(id.into_owned());
    }
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if matches!(segment, "embed" | "v" | "shorts" | "live") {
            return segments.next().filter(|id| !id.is_empty()).map(str::to_string);
        }
    }
    None
}

/// Vimeo video pages are `/<numeric id>`, possibly under extra path segments
fn vimeo_video_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .last()
        .map(str::to_string)
}
