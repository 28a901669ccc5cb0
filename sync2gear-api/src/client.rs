use std::time::Duration;

use rest_client::RestClient;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::operation::{Acknowledgement, ControlOperation, HttpMethod, RetryPolicy};
use crate::operations::{
    GetPlaybackStateOperation, GetPlaybackStateRequest, ListZonesOperation, ListZonesRequest,
    NextOperation, NextOperationRequest, PauseOperation, PauseOperationRequest, PlayOperation,
    PlayOperationRequest, PreviousOperation, PreviousOperationRequest, ResumeOperation,
    ResumeOperationRequest, SeekOperation, SeekOperationRequest, SetVolumeOperation,
    SetVolumeOperationRequest,
};
use crate::wire::{WireSnapshot, WireZone};

/// What to start playing on a zone
#[derive(Debug, Clone, PartialEq)]
pub enum PlaySelection {
    Playlists(Vec<String>),
    MusicFiles(Vec<String>),
}

/// A client for executing sync2gear operations against the backend
///
/// This client bridges the stateless operation definitions and actual HTTP
/// requests. Requests are blocking; callers that must not block run them on
/// a worker thread.
///
/// ```rust,ignore
/// use sync2gear_api::{ClientConfig, Sync2gearClient};
///
/// let client = Sync2gearClient::from_config(&ClientConfig::from_env())?;
/// client.pause("2f1c9a4e-0000-4000-8000-000000000001")?;
/// ```
#[derive(Debug, Clone)]
pub struct Sync2gearClient {
    rest: RestClient,
    retry: RetryPolicy,
}

impl Sync2gearClient {
    /// Create a client with default timeouts and retry policy
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(api_base_url),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a client from a validated configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let rest = RestClient::with_timeouts(
            config.api_base_url.clone(),
            config.connect_timeout,
            config.read_timeout,
        );
        if let Some(access) = &config.access_token {
            rest.set_tokens(access.clone(), config.refresh_token.clone());
        }

        Ok(Self {
            rest,
            retry: config.retry.clone(),
        })
    }

    /// Create a client around an existing REST client
    pub fn with_rest_client(rest: RestClient) -> Self {
        Self {
            rest,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying REST client, for token management
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Current access token, used to authenticate the realtime feed
    pub fn access_token(&self) -> Option<String> {
        self.rest.access_token()
    }

    /// Execute an operation
    ///
    /// The request is validated first. Network failures are retried according
    /// to the retry policy; HTTP status errors are returned immediately.
    pub fn execute<Op: ControlOperation>(&self, request: &Op::Request) -> Result<Op::Response> {
        Op::validate(request)?;
        let path = Op::path(request);

        let mut attempt = 0;
        loop {
            let result: Result<serde_json::Value> = match Op::METHOD {
                HttpMethod::Get => self.rest.get_json(&path).map_err(ApiError::from),
                HttpMethod::Post => self.rest.post_json(&path, request).map_err(ApiError::from),
            };

            match result {
                Ok(value) => return Op::parse_response(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        Op::NAME,
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    if delay > Duration::ZERO {
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", Op::NAME, e);
                    return Err(e);
                }
            }
        }
    }

    /// Start playback of playlists or individual music files
    pub fn play(&self, zone_id: &str, selection: PlaySelection, shuffle: bool) -> Result<Acknowledgement> {
        let (playlist_ids, music_file_ids) = match selection {
            PlaySelection::Playlists(ids) => (ids, Vec::new()),
            PlaySelection::MusicFiles(ids) => (Vec::new(), ids),
        };
        self.execute::<PlayOperation>(&PlayOperationRequest {
            zone_id: zone_id.to_string(),
            shuffle,
            playlist_ids,
            music_file_ids,
        })
    }

    pub fn pause(&self, zone_id: &str) -> Result<Acknowledgement> {
        self.execute::<PauseOperation>(&PauseOperationRequest {
            zone_id: zone_id.to_string(),
        })
    }

    pub fn resume(&self, zone_id: &str) -> Result<Acknowledgement> {
        self.execute::<ResumeOperation>(&ResumeOperationRequest {
            zone_id: zone_id.to_string(),
        })
    }

    pub fn next(&self, zone_id: &str) -> Result<Acknowledgement> {
        self.execute::<NextOperation>(&NextOperationRequest {
            zone_id: zone_id.to_string(),
        })
    }

    pub fn previous(&self, zone_id: &str) -> Result<Acknowledgement> {
        self.execute::<PreviousOperation>(&PreviousOperationRequest {
            zone_id: zone_id.to_string(),
        })
    }

    /// Set the zone volume (0-100)
    pub fn set_volume(&self, zone_id: &str, volume: u8) -> Result<Acknowledgement> {
        self.execute::<SetVolumeOperation>(&SetVolumeOperationRequest {
            zone_id: zone_id.to_string(),
            volume,
        })
    }

    /// Seek within the current item, in seconds
    pub fn seek(&self, zone_id: &str, position: f64) -> Result<Acknowledgement> {
        self.execute::<SeekOperation>(&SeekOperationRequest {
            zone_id: zone_id.to_string(),
            position,
        })
    }

    /// Fetch the current playback state of a zone
    pub fn playback_state(&self, zone_id: &str) -> Result<Option<WireSnapshot>> {
        self.execute::<GetPlaybackStateOperation>(&GetPlaybackStateRequest {
            zone_id: zone_id.to_string(),
        })
    }

    /// List the zones visible to the authenticated client
    pub fn zones(&self) -> Result<Vec<WireZone>> {
        self.execute::<ListZonesOperation>(&ListZonesRequest)
    }
}
