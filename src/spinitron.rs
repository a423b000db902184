use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::app::engine::SpinFeed;

pub const DEFAULT_BASE_URL: &str = "https://spinitron.com/api";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected feed response: {0}")]
    Parse(String),
}

/// One playlist entry for a single track's airing.
#[derive(Debug, Clone, Deserialize)]
pub struct Spin {
    pub id: u64,
    pub artist: String,
    pub song: String,
    pub release: Option<String>,
    pub duration: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub playlist_id: u64,
}

impl Spin {
    /// Seconds of play time left at `now`; negative once the spin has ended.
    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        (self.end - now).num_seconds()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistInfo {
    pub category: Option<String>,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct SpinsPage {
    items: Vec<Spin>,
}

pub struct SpinitronClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl SpinitronClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(READ_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Fetches the single most recent spin from the station feed.
    pub fn latest_spin(&self) -> Result<Spin, FeedError> {
        let body = self.get(&format!("{}/spins?count=1", self.base_url))?;
        let page: SpinsPage = serde_json::from_str(&body)
            .map_err(|err| FeedError::Parse(format!("spins response: {err}")))?;
        page.items
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::Parse("spins response contained no items".to_string()))
    }

    pub fn playlist(&self, id: u64) -> Result<PlaylistInfo, FeedError> {
        let body = self.get(&format!("{}/playlists/{id}", self.base_url))?;
        serde_json::from_str(&body)
            .map_err(|err| FeedError::Parse(format!("playlist response: {err}")))
    }

    fn get(&self, url: &str) -> Result<String, FeedError> {
        let request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.api_key));

        match request.call() {
            Ok(response) => response
                .into_string()
                .map_err(|err| FeedError::Transport(format!("response decode failed: {err}"))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().ok().unwrap_or_default();
                let body = body.trim();
                if body.is_empty() {
                    Err(FeedError::Transport(format!("HTTP status {status}")))
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    Err(FeedError::Transport(format!(
                        "HTTP status {status} ({truncated})"
                    )))
                }
            }
            Err(ureq::Error::Transport(err)) => Err(FeedError::Transport(err.to_string())),
        }
    }
}

impl SpinFeed for SpinitronClient {
    fn latest_spin(&self) -> Result<Spin, FeedError> {
        SpinitronClient::latest_spin(self)
    }

    fn playlist(&self, id: u64) -> Result<PlaylistInfo, FeedError> {
        SpinitronClient::playlist(self, id)
    }
}
