//! Playback state fetch

use crate::error::{ApiError, Result};
use crate::operation::{require_zone, ControlOperation, HttpMethod};
use crate::wire::WireSnapshot;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GetPlaybackStateRequest {
    pub zone_id: String,
}

/// Fetch the current playback state of one zone
///
/// The backend creates an idle state for zones that never played, but a
/// `null` answer is still tolerated and reported as `None`.
pub struct GetPlaybackStateOperation;

impl ControlOperation for GetPlaybackStateOperation {
    type Request = GetPlaybackStateRequest;
    type Response = Option<WireSnapshot>;

    const METHOD: HttpMethod = HttpMethod::Get;
    const PATH: &'static str = "/playback/state/by_zone/";
    const NAME: &'static str = "GetPlaybackState";

    fn path(request: &Self::Request) -> String {
        format!("{}?zone_id={}", Self::PATH, request.zone_id.trim())
    }

    fn validate(request: &Self::Request) -> Result<()> {
        require_zone(&request.zone_id)?;
        if !request
            .zone_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ApiError::InvalidParameter(format!(
                "zone_id contains invalid characters: {}",
                request.zone_id
            )));
        }
        Ok(())
    }

    fn parse_response(value: serde_json::Value) -> Result<Self::Response> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }
}
