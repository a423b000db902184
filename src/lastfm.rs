use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::app::engine::TrackReporter;
use crate::signer;

pub const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Track fields sent with a now-playing or scrobble report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub track: String,
    pub album: Option<String>,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Success,
    KnownServiceError(ServiceError),
    TransportError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub http_status: u16,
    pub code: Option<u32>,
    pub message: Option<String>,
}

/// Last.fm's documented error codes for the calls this client makes.
pub fn describe_code(code: u32) -> Option<&'static str> {
    match code {
        2 => Some("Invalid service - This service does not exist"),
        3 => Some("Invalid Method - No method with that name in this package"),
        4 => Some("Authentication Failed - You do not have permissions to access the service"),
        5 => Some("Invalid format - This service doesn't exist in that format"),
        6 => Some("Invalid parameters - Your request is missing a required parameter"),
        7 => Some("Invalid resource specified"),
        8 => Some("Operation failed - Something else went wrong"),
        9 => Some("Invalid session key - Please re-authenticate"),
        10 => Some("Invalid API key - You must be granted a valid key by last.fm"),
        11 => Some("Service Offline - This service is temporarily offline. Try again later."),
        13 => Some("Invalid method signature supplied"),
        16 => Some("There was a temporary error processing your request. Please try again"),
        26 => Some("Suspended API key - Access for your account has been suspended"),
        29 => Some("Rate limit exceeded - Your IP has made too many requests in a short period"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct LfmEnvelope {
    token: Option<String>,
    session: Option<LfmSession>,
    error: Option<LfmError>,
}

#[derive(Debug, Deserialize)]
struct LfmSession {
    key: String,
}

#[derive(Debug, Deserialize)]
struct LfmError {
    #[serde(rename = "@code")]
    code: u32,
    #[serde(rename = "$text")]
    message: Option<String>,
}

pub struct LastfmClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    api_secret: String,
    session_key: String,
}

impl LastfmClient {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, api_secret)
    }

    pub fn with_base_url(base_url: &str, api_key: &str, api_secret: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(READ_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            session_key: String::new(),
        }
    }

    /// Attaches the web service session key; required before the reporting
    /// calls, not used by the auth calls.
    pub fn with_session_key(mut self, session_key: &str) -> Self {
        self.session_key = session_key.to_string();
        self
    }

    /// `auth.getToken`: fetches a request token for the setup flow.
    pub fn get_token(&self) -> Result<String> {
        let params = vec![
            ("method", "auth.getToken".to_string()),
            ("api_key", self.api_key.clone()),
        ];
        let body = self.post_for_auth(params)?;
        let envelope = parse_envelope(&body)
            .ok_or_else(|| anyhow!("auth.getToken returned unparseable XML"))?;
        if let Some(error) = &envelope.error {
            return Err(anyhow!(
                "auth.getToken rejected: code {} ({})",
                error.code,
                error.message.as_deref().unwrap_or("no message")
            ));
        }
        envelope
            .token
            .ok_or_else(|| anyhow!("auth.getToken response carried no token"))
    }

    /// `auth.getSession`: exchanges an authorized token for a session key.
    /// Fails when the user has not yet approved the token.
    pub fn get_session(&self, token: &str) -> Result<String> {
        let params = vec![
            ("method", "auth.getSession".to_string()),
            ("api_key", self.api_key.clone()),
            ("token", token.to_string()),
        ];
        let body = self.post_for_auth(params)?;
        let envelope = parse_envelope(&body)
            .ok_or_else(|| anyhow!("auth.getSession returned unparseable XML"))?;
        if let Some(error) = &envelope.error {
            return Err(anyhow!(
                "auth.getSession rejected: code {} ({})",
                error.code,
                error.message.as_deref().unwrap_or("no message")
            ));
        }
        envelope
            .session
            .map(|session| session.key)
            .ok_or_else(|| anyhow!("no session key in the response; was the token authorized?"))
    }

    /// URL the user must visit to authorize a request token.
    pub fn authorize_url(&self, token: &str) -> String {
        format!(
            "http://www.last.fm/api/auth/?api_key={}&token={token}",
            self.api_key
        )
    }

    /// `track.updateNowPlaying`.
    pub fn update_now_playing(&self, track: &TrackTags) -> ReportOutcome {
        let mut params = vec![
            ("method", "track.updateNowPlaying".to_string()),
            ("artist", track.artist.clone()),
            ("track", track.track.clone()),
            ("api_key", self.api_key.clone()),
            ("sk", self.session_key.clone()),
        ];
        push_optional_tags(&mut params, track);
        self.report("track.updateNowPlaying", params)
    }

    /// `track.scrobble`; `timestamp` is the epoch second the spin ended,
    /// passed through from the feed.
    pub fn scrobble(&self, track: &TrackTags, timestamp: i64) -> ReportOutcome {
        let mut params = vec![
            ("method", "track.scrobble".to_string()),
            ("artist", track.artist.clone()),
            ("track", track.track.clone()),
            ("timestamp", timestamp.to_string()),
            ("api_key", self.api_key.clone()),
            ("sk", self.session_key.clone()),
        ];
        push_optional_tags(&mut params, track);
        self.report("track.scrobble", params)
    }

    fn report(&self, method: &str, params: Vec<(&str, String)>) -> ReportOutcome {
        let outcome = match self.post_signed(params) {
            Ok((status, body)) => classify(status, &body),
            Err(err) => {
                log::error!("{method} request could not reach the service: {err}");
                return ReportOutcome::TransportError;
            }
        };

        if let ReportOutcome::KnownServiceError(error) = &outcome {
            let detail = error
                .code
                .map(|code| {
                    format!(
                        "service error code {code}: {}",
                        describe_code(code).unwrap_or("unrecognized code")
                    )
                })
                .unwrap_or_else(|| "no service error code in the response".to_string());
            log::error!(
                "{method} request failed with HTTP status {}; {detail}{}",
                error.http_status,
                error
                    .message
                    .as_deref()
                    .map(|m| format!(" ({m})"))
                    .unwrap_or_default()
            );
        }
        outcome
    }

    fn post_signed(&self, mut params: Vec<(&str, String)>) -> Result<(u16, String), String> {
        let signature = signer::sign(&params, &self.api_secret);
        params.push(("api_sig", signature));
        let form: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();

        match self.agent.post(&self.base_url).send_form(&form) {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                Ok((status, body))
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().ok().unwrap_or_default();
                Ok((status, body))
            }
            Err(ureq::Error::Transport(err)) => Err(err.to_string()),
        }
    }

    fn post_for_auth(&self, params: Vec<(&str, String)>) -> Result<String> {
        let (status, body) = self
            .post_signed(params)
            .map_err(|err| anyhow!("transport error: {err}"))?;
        if !(200..300).contains(&status) && parse_envelope(&body).is_none() {
            return Err(anyhow!("auth call failed with HTTP status {status}"));
        }
        Ok(body)
    }
}

fn push_optional_tags(params: &mut Vec<(&'static str, String)>, track: &TrackTags) {
    if let Some(album) = &track.album {
        if !album.is_empty() {
            params.push(("album", album.clone()));
        }
    }
    if let Some(duration) = track.duration {
        if duration > 0 {
            params.push(("duration", duration.to_string()));
        }
    }
}

fn parse_envelope(body: &str) -> Option<LfmEnvelope> {
    quick_xml::de::from_str::<LfmEnvelope>(body).ok()
}

/// Success range with no recognized embedded error code is `Success`; an
/// error status or an embedded code is `KnownServiceError`.
fn classify(status: u16, body: &str) -> ReportOutcome {
    let error = parse_envelope(body).and_then(|envelope| envelope.error);
    if let Some(error) = error {
        return ReportOutcome::KnownServiceError(ServiceError {
            http_status: status,
            code: Some(error.code),
            message: error.message,
        });
    }
    if (200..300).contains(&status) {
        ReportOutcome::Success
    } else {
        ReportOutcome::KnownServiceError(ServiceError {
            http_status: status,
            code: None,
            message: None,
        })
    }
}

impl TrackReporter for LastfmClient {
    fn now_playing(&self, track: &TrackTags) -> ReportOutcome {
        self.update_now_playing(track)
    }

    fn scrobble(&self, track: &TrackTags, timestamp: i64) -> ReportOutcome {
        LastfmClient::scrobble(self, track, timestamp)
    }
}
